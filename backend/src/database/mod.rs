//! Module for database connection setup and common utilities.
//!
//! This module is responsible for initializing the database connection pool,
//! applying the embedded migrations, and providing a central point for
//! database-related helpers.

use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::time::Duration;

pub mod models;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Initializes the database connection pool and runs pending migrations.
    pub async fn new(config: &Config) -> Result<Self> {
        let database_url = &config.database_url;

        // An in-memory database lives only as long as its connection, so
        // keep exactly one connection open for the whole process.
        let in_memory = database_url.contains(":memory:");
        let mut options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { config.max_connections })
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("failed to connect to {database_url}"))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;

        Ok(Database { pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection pool closed");
    }
}

//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the database URL, token signing secrets and lifetimes, lockout policy,
//! cookie security mode, and the optional SMTP relay.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    /// Signing secret for refresh tokens. Falls back to `jwt_secret`.
    pub refresh_secret: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub environment: String,
    pub client_url: String,
    pub server_port: u16,
    pub audit_log_path: String,
    pub blacklist_sweep_interval_seconds: u64,
    pub max_failed_login_attempts: u32,
    pub lockout_duration_seconds: u64,
    pub otp_ttl_seconds: u64,
    pub email_verification_ttl_seconds: u64,
    pub bcrypt_cost: u32,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from_email: Option<String>,
    pub smtp_from_name: String,
}

/// SMTP settings, only present when every required variable is set.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub base_url: String,
}

fn parse_or<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid number"))
}

/// Rejects lifetimes that do not fit a `chrono::Duration` or would push an
/// expiry past the largest representable timestamp.
fn checked_seconds(key: &str, value: u64) -> Result<u64> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .with_context(|| format!("{key} is out of range"))?;
    Ok(value)
}

fn parse_seconds(key: &str, default: &str) -> Result<u64> {
    checked_seconds(key, parse_or(key, default)?)
}

/// Configured seconds as a `Duration`. Values are range-checked when the
/// configuration is loaded; anything else collapses to zero.
pub fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::zero)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let jwt_secret = env::var("SECRET_KEY").context("SECRET_KEY not set")?;
        let refresh_secret = env::var("REFRESH_SECRET_KEY").unwrap_or_else(|_| jwt_secret.clone());

        Ok(Config {
            database_url,
            max_connections: parse_or("DB_MAX_CONNECTIONS", "5")?,
            acquire_timeout_seconds: parse_or("DB_ACQUIRE_TIMEOUT_SECONDS", "3")?,
            jwt_secret,
            refresh_secret,
            access_token_ttl_seconds: parse_seconds("ACCESS_TOKEN_TTL_SECONDS", "900")?,
            refresh_token_ttl_seconds: parse_seconds("REFRESH_TOKEN_TTL_SECONDS", "604800")?,
            environment: env::var("ENV").unwrap_or_else(|_| "development".to_string()),
            client_url: env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            server_port: parse_or("SERVER_PORT", "3000")?,
            audit_log_path: env::var("AUDIT_LOG_PATH")
                .unwrap_or_else(|_| "logs/audit.log".to_string()),
            blacklist_sweep_interval_seconds: parse_or("BLACKLIST_SWEEP_INTERVAL_SECONDS", "3600")?,
            max_failed_login_attempts: parse_or("MAX_FAILED_LOGIN_ATTEMPTS", "5")?,
            lockout_duration_seconds: parse_seconds("LOCKOUT_DURATION_SECONDS", "1800")?,
            otp_ttl_seconds: parse_seconds("OTP_TTL_SECONDS", "300")?,
            email_verification_ttl_seconds: parse_seconds("EMAIL_VERIFICATION_TTL_SECONDS", "86400")?,
            bcrypt_cost: parse_or("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: parse_or("SMTP_PORT", "587")?,
            smtp_username: non_empty("SMTP_USERNAME"),
            smtp_password: non_empty("SMTP_PASSWORD"),
            smtp_from_email: non_empty("SMTP_FROM_EMAIL"),
            smtp_from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Portfolio".to_string()),
        })
    }

    /// Production mode enables `Secure`/`SameSite=None` cookies and hides
    /// internal error details.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Returns the SMTP configuration if every required value is present.
    pub fn email_config(&self) -> Option<EmailConfig> {
        Some(EmailConfig {
            smtp_host: self.smtp_host.clone()?,
            smtp_port: self.smtp_port,
            smtp_username: self.smtp_username.clone()?,
            smtp_password: self.smtp_password.clone()?,
            from_email: self.smtp_from_email.clone()?,
            from_name: self.smtp_from_name.clone(),
            base_url: self.client_url.clone(),
        })
    }

    /// Settings used by unit and router tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_seconds: 3,
            jwt_secret: "test-secret".to_string(),
            refresh_secret: "test-secret".to_string(),
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 604_800,
            environment: "development".to_string(),
            client_url: "http://localhost:3000".to_string(),
            server_port: 0,
            audit_log_path: String::new(),
            blacklist_sweep_interval_seconds: 3600,
            max_failed_login_attempts: 5,
            lockout_duration_seconds: 1800,
            otp_ttl_seconds: 300,
            email_verification_ttl_seconds: 86_400,
            bcrypt_cost: 4,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from_email: None,
            smtp_from_name: "Portfolio".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_lifetimes_are_rejected() {
        assert_eq!(checked_seconds("LOCKOUT_DURATION_SECONDS", 1800).unwrap(), 1800);
        assert!(checked_seconds("LOCKOUT_DURATION_SECONDS", u64::MAX).is_err());

        let err = checked_seconds("ACCESS_TOKEN_TTL_SECONDS", i64::MAX as u64).unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_TTL_SECONDS"));
    }

    #[test]
    fn seconds_never_panics() {
        assert_eq!(seconds(900), Duration::minutes(15));
        assert_eq!(seconds(u64::MAX), Duration::zero());
    }

    #[test]
    fn lifetimes_from_loaded_config_stay_in_range() {
        let config = Config::for_tests();
        for value in [
            config.access_token_ttl_seconds,
            config.refresh_token_ttl_seconds,
            config.lockout_duration_seconds,
            config.otp_ttl_seconds,
            config.email_verification_ttl_seconds,
        ] {
            assert!(checked_seconds("TTL", value).is_ok());
        }
    }
}

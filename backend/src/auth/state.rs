//! Shared state injected into every auth handler and the session guard.

use sqlx::SqlitePool;
use std::sync::Arc;

use super::audit::AuditLogger;
use super::blacklist::TokenBlacklist;
use super::lockout::LockoutPolicy;
use crate::config::Config;
use crate::services::email_service::EmailService;
use crate::utils::jwt::JwtUtils;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtUtils>,
    pub lockout: LockoutPolicy,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub audit: AuditLogger,
    /// `None` when SMTP is not configured; mail is then skipped.
    pub email: Option<Arc<EmailService>>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Config,
        blacklist: Arc<dyn TokenBlacklist>,
        audit: AuditLogger,
    ) -> Self {
        let email = match config.email_config() {
            Some(email_config) => match EmailService::new(email_config) {
                Ok(service) => {
                    tracing::info!("Email service initialized successfully");
                    Some(Arc::new(service))
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize email service: {}. Email notifications will be disabled.",
                        e
                    );
                    None
                }
            },
            None => {
                tracing::warn!(
                    "Email configuration not found. Email notifications will be disabled."
                );
                None
            }
        };

        Self {
            jwt: Arc::new(JwtUtils::new(&config)),
            lockout: LockoutPolicy::from_config(&config),
            config: Arc::new(config),
            pool,
            blacklist,
            audit,
            email,
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.is_production()
    }

    /// Whether error responses may include internal details.
    pub fn verbose_errors(&self) -> bool {
        !self.config.is_production()
    }
}

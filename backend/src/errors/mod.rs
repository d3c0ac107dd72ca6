//! Global application error types.
//!
//! This module defines the service-layer error taxonomy shared by the
//! authentication flows. HTTP mapping lives in `api::common`.

use thiserror::Error;

/// Generic service error used across all auth flows.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No usable credentials were presented, or they failed verification.
    #[error("{message}")]
    AuthenticationRequired { message: String },

    /// The access token expired. Consumed by the session guard to start a
    /// refresh, never surfaced directly.
    #[error("Token has expired")]
    TokenExpired,

    #[error("{message}")]
    AccountLocked { message: String },

    /// Wrong password or unknown email. The two cases share one message.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{message}")]
    Validation { message: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn authentication_required(message: impl Into<String>) -> Self {
        Self::AuthenticationRequired {
            message: message.into(),
        }
    }

    pub fn account_locked(message: impl Into<String>) -> Self {
        Self::AccountLocked {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Machine-readable category used in error responses.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::AuthenticationRequired { .. } => "authentication_required",
            ServiceError::TokenExpired => "token_expired",
            ServiceError::AccountLocked { .. } => "account_locked",
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::Validation { .. } => "validation_error",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::PermissionDenied { .. } => "permission_denied",
            ServiceError::Database { .. } => "database_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

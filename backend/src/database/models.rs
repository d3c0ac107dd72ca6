//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. API-facing projections live in `auth::models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Role attached to every account. Unknown values fall back to `User` at the
/// API boundary; the table's CHECK constraint rejects anything else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Seller,
}

impl UserRole {
    /// Parses an optional client-supplied role, silently defaulting to `User`.
    pub fn from_request(role: Option<&str>) -> Self {
        role.and_then(|r| r.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "seller" => Ok(UserRole::Seller),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Persisted user record. Never serialized directly to clients.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub failed_login_attempts: i64,
    pub account_locked: bool,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub refresh_token_expiry: Option<DateTime<Utc>>,
    /// One-time password-reset code (numeric, stored as a string).
    pub reset_token: Option<String>,
    pub otp_expiry: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new user. The password is already hashed and the
/// confirmation field has been dropped.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub email_verification_token: String,
    pub email_token_expiry: DateTime<Utc>,
}

/// Lockout counters written back after a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_login_attempts: i64,
    pub account_locked: bool,
    pub account_locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    pub fn cleared() -> Self {
        Self {
            failed_login_attempts: 0,
            account_locked: false,
            account_locked_until: None,
        }
    }
}

impl From<&User> for LockoutState {
    fn from(user: &User) -> Self {
        Self {
            failed_login_attempts: user.failed_login_attempts,
            account_locked: user.account_locked,
            account_locked_until: user.account_locked_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_defaults_to_user() {
        assert_eq!(UserRole::from_request(None), UserRole::User);
        assert_eq!(UserRole::from_request(Some("superuser")), UserRole::User);
        assert_eq!(UserRole::from_request(Some("Seller")), UserRole::Seller);
        assert_eq!(UserRole::from_request(Some("admin")), UserRole::Admin);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Seller).unwrap();
        assert_eq!(json, "\"seller\"");
    }
}

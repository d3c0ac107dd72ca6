//! Request and response payloads for the authentication endpoints.
//!
//! Request bodies use camelCase field names to match the frontend. Responses
//! only ever carry the public projection of a user; hashes, tokens and lockout
//! counters stay server-side.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::database::models::{User, UserRole};

/// Login request payload. Missing fields deserialize as empty and are
/// rejected by validation.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub phone: Option<String>,

    pub password: String,

    pub confirm_password: String,

    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

/// Every field is optional so a missing one surfaces as a 400 from the
/// service rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
    pub user_id: Option<String>,
}

/// Public projection returned by login.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserInfo,
}

/// Body of signup and forgot-password responses.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdResponse {
    pub user_id: String,
}

/// `GET /me` projection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub email_verified: bool,
    pub bookings: Vec<String>,
}

impl CurrentUser {
    pub fn new(user: User, bookings: Vec<String>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            role: user.role,
            email_verified: user.email_verified,
            bookings,
        }
    }
}

/// Identity attached to a request by the session guard.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: UserRole,
}

//! Password hashing and strength policy.

use crate::errors::{ServiceError, ServiceResult};
use bcrypt::{hash, verify};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a salted bcrypt digest at the given cost.
///
/// # Errors
/// Returns `ServiceError::Internal` if hashing fails
pub fn hash_password(password: &str, cost: u32) -> ServiceResult<String> {
    hash(password, cost)
        .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {e}")))
}

/// Compare a plaintext password with a stored hash.
///
/// # Errors
/// A malformed stored hash is an internal error, never a mismatch.
pub fn verify_password(password: &str, hash: &str) -> ServiceResult<bool> {
    verify(password, hash)
        .map_err(|e| ServiceError::internal_error(format!("Password verification failed: {e}")))
}

/// Checks password strength, returning every unmet rule.
pub fn check_password_strength(password: &str) -> Result<(), Vec<&'static str>> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain a number");
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        problems.push("Password must contain a special character");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

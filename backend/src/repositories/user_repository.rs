//! Database repository for user management operations.
//!
//! Provides persistence for user credentials, lockout counters, the current
//! refresh token, password-reset codes, email verification, and the ordered
//! booking references owned by a user.

use crate::database::models::{CreateUser, LockoutState, User};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = r#"
    id, username, email, phone, password_hash, role,
    failed_login_attempts, account_locked, account_locked_until,
    refresh_token, refresh_token_expiry, reset_token, otp_expiry,
    email_verified, email_verification_token, email_token_expiry,
    created_at, updated_at
"#;

/// Whether a repository error came from a `UNIQUE` constraint.
pub fn is_unique_violation(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Creates a new UserRepository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new user in the database.
    ///
    /// # Returns
    /// The newly created User with all fields populated
    pub async fn create_user(&self, user: CreateUser) -> Result<User> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO users (
                id, username, email, phone, password_hash, role,
                email_verification_token, email_token_expiry, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(&user.email_verification_token)
            .bind(user.email_token_expiry)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves a user by their unique identifier.
    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.fetch_one_by("id", id).await
    }

    /// Retrieves a user by their email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_by("email", email).await
    }

    /// Retrieves the user holding an email verification token.
    pub async fn get_user_by_verification_token(&self, token: &str) -> Result<Option<User>> {
        self.fetch_one_by("email_verification_token", token).await
    }

    async fn fetch_one_by(&self, column: &'static str, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Checks if an email or username is already registered.
    pub async fn identity_exists(&self, email: &str, username: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? OR username = ?")
                .bind(email)
                .bind(username)
                .fetch_one(self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Writes the lockout counters after a login attempt.
    pub async fn update_lockout(&self, id: &str, state: &LockoutState) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = ?, account_locked = ?, account_locked_until = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.failed_login_attempts)
        .bind(state.account_locked)
        .bind(state.account_locked_until)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Stores the latest refresh token, replacing any previous one.
    pub async fn set_refresh_token(
        &self,
        id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token = ?, refresh_token_expiry = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Removes the stored refresh token, returning whether a row changed.
    pub async fn clear_refresh_token(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = NULL, refresh_token_expiry = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores a password-reset code and its expiry.
    pub async fn set_reset_token(
        &self,
        id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET reset_token = ?, otp_expiry = ?, updated_at = ? WHERE id = ?")
            .bind(token)
            .bind(expires_at)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Replaces the password hash and consumes the reset code.
    pub async fn reset_password(&self, id: &str, password_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, reset_token = NULL, otp_expiry = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Marks the email as verified and consumes the verification token.
    pub async fn mark_email_verified(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = 1, email_verification_token = NULL, email_token_expiry = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Booking references owned by a user, in insertion order.
    pub async fn get_booking_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT booking_id FROM user_bookings WHERE user_id = ? ORDER BY position ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }

    /// Appends a booking reference to the end of a user's list. Bookings are
    /// written by the booking service; this service only reads them.
    #[cfg(test)]
    pub async fn append_booking(&self, user_id: &str, booking_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_bookings (user_id, booking_id, position)
            VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM user_bookings WHERE user_id = ?))
            "#,
        )
        .bind(user_id)
        .bind(booking_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::Database;
    use crate::database::models::UserRole;
    use chrono::Duration;

    async fn setup() -> Database {
        Database::new(&Config::for_tests()).await.unwrap()
    }

    fn new_user(id: &str, email: &str) -> CreateUser {
        CreateUser {
            id: id.to_string(),
            username: format!("user-{id}"),
            email: email.to_string(),
            phone: None,
            password_hash: "hash".to_string(),
            role: UserRole::User,
            email_verification_token: format!("verify-{id}"),
            email_token_expiry: Utc::now() + Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());

        let created = repo.create_user(new_user("u1", "a@x.com")).await.unwrap();
        assert_eq!(created.role, UserRole::User);
        assert_eq!(created.failed_login_attempts, 0);
        assert!(!created.account_locked);
        assert!(!created.email_verified);

        let by_email = repo.get_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert!(repo.identity_exists("a@x.com", "nobody").await.unwrap());
        assert!(!repo.identity_exists("b@x.com", "nobody").await.unwrap());
        assert!(repo.get_user_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_identity_is_a_unique_violation() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        repo.create_user(new_user("u1", "a@x.com")).await.unwrap();

        let err = repo
            .create_user(new_user("u2", "a@x.com"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let err = repo
            .get_user_by_id("u1")
            .await
            .and_then(|_| Err::<(), _>(anyhow::anyhow!("not a database error")))
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[tokio::test]
    async fn refresh_token_is_overwritten() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        repo.create_user(new_user("u1", "a@x.com")).await.unwrap();

        let expiry = Utc::now() + Duration::days(7);
        repo.set_refresh_token("u1", "first", expiry).await.unwrap();
        repo.set_refresh_token("u1", "second", expiry).await.unwrap();

        let user = repo.get_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(user.refresh_token.as_deref(), Some("second"));

        assert!(repo.clear_refresh_token("u1").await.unwrap());
        let user = repo.get_user_by_id("u1").await.unwrap().unwrap();
        assert!(user.refresh_token.is_none());
        assert!(user.refresh_token_expiry.is_none());
    }

    #[tokio::test]
    async fn bookings_keep_insertion_order() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        repo.create_user(new_user("u1", "a@x.com")).await.unwrap();

        repo.append_booking("u1", "b-2").await.unwrap();
        repo.append_booking("u1", "b-1").await.unwrap();
        repo.append_booking("u1", "b-3").await.unwrap();

        let ids = repo.get_booking_ids("u1").await.unwrap();
        assert_eq!(ids, vec!["b-2", "b-1", "b-3"]);
    }

    #[tokio::test]
    async fn invalid_role_is_rejected_by_the_table() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        repo.create_user(new_user("u1", "a@x.com")).await.unwrap();

        let result = sqlx::query("UPDATE users SET role = 'root' WHERE id = 'u1'")
            .execute(db.pool())
            .await;
        assert!(result.is_err());
    }
}

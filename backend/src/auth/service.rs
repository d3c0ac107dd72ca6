//! Core business logic for the authentication system.
//!
//! Handlers and the session guard stay thin: they extract cookies and bodies,
//! call into `AuthService`, and translate the outcome into cookies and JSON.

use chrono::Utc;
use validator::{Validate, ValidationErrors};

use crate::api::common::validation_errors_to_field_errors;
use crate::auth::audit::{AuditEntry, AuditEvent, ClientInfo};
use crate::auth::lockout::LockStatus;
use crate::auth::models::*;
use crate::auth::state::AppState;
use crate::config::seconds;
use crate::database::models::{CreateUser, LockoutState, User, UserRole};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::user_repository::{UserRepository, is_unique_violation};
use crate::utils::generate_random_string::{generate_otp, generate_random_string};
use crate::utils::jwt::{TokenError, TokenPair, TokenType};
use crate::utils::password::{check_password_strength, hash_password, verify_password};

pub const LOCKED_LOGIN_MESSAGE: &str =
    "Account is temporarily locked due to too many failed login attempts. Please try again later.";

const VERIFICATION_TOKEN_LENGTH: usize = 40;

/// Result of a successful login.
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

/// Identity established by the session guard, plus a rotated token pair
/// when the access token had to be refreshed.
pub struct SessionOutcome {
    pub context: AuthContext,
    pub refreshed: Option<TokenPair>,
}

/// Authentication service for login, registration, password recovery and
/// session management.
pub struct AuthService<'a> {
    state: &'a AppState,
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        AuthService {
            users: UserRepository::new(&state.pool),
            state,
        }
    }

    /// Authenticate by email and password, applying the lockout policy.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> ServiceResult<LoginOutcome> {
        request
            .validate()
            .map_err(|e| ServiceError::validation(validation_message(&e)))?;

        let email = request.email.trim();
        let Some(user) = self.users.get_user_by_email(email).await? else {
            self.audit(
                AuditEntry::new(AuditEvent::LoginFailure, "Login attempt for unknown email")
                    .email(email)
                    .client(client),
            )
            .await;
            return Err(ServiceError::InvalidCredentials);
        };

        let now = Utc::now();
        let state = match self.state.lockout.evaluate(&LockoutState::from(&user), now) {
            LockStatus::Locked { .. } => {
                self.audit(
                    AuditEntry::new(AuditEvent::LoginFailure, "Login attempt on locked account")
                        .user(&user)
                        .client(client),
                )
                .await;
                return Err(ServiceError::account_locked(LOCKED_LOGIN_MESSAGE));
            }
            LockStatus::Open { state, unlocked } => {
                if unlocked {
                    self.users.update_lockout(&user.id, &state).await?;
                    self.audit(
                        AuditEntry::new(AuditEvent::AccountUnlocked, "Lock expired")
                            .user(&user)
                            .client(client),
                    )
                    .await;
                }
                state
            }
        };

        if !verify_password(&request.password, &user.password_hash)? {
            let next = self.state.lockout.register_failure(&state, now);
            self.users.update_lockout(&user.id, &next).await?;

            if next.account_locked {
                self.audit(
                    AuditEntry::new(
                        AuditEvent::AccountLocked,
                        format!(
                            "Locked after {} failed attempts",
                            next.failed_login_attempts
                        ),
                    )
                    .user(&user)
                    .client(client),
                )
                .await;
            }
            self.audit(
                AuditEntry::new(AuditEvent::LoginFailure, "Invalid password")
                    .user(&user)
                    .client(client),
            )
            .await;
            return Err(ServiceError::InvalidCredentials);
        }

        if state.failed_login_attempts != 0 {
            self.users
                .update_lockout(&user.id, &LockoutState::cleared())
                .await?;
        }

        let tokens = self.issue_session(&user).await?;
        self.audit(
            AuditEntry::new(AuditEvent::LoginSuccess, "Login successful")
                .user(&user)
                .client(client),
        )
        .await;

        Ok(LoginOutcome { user, tokens })
    }

    /// Register a new account. Password policy is enforced before anything
    /// touches the database.
    pub async fn signup(
        &self,
        request: SignupRequest,
        client: &ClientInfo,
    ) -> ServiceResult<UserIdResponse> {
        request
            .validate()
            .map_err(|e| ServiceError::validation(validation_message(&e)))?;

        if let Err(problems) = check_password_strength(&request.password) {
            return Err(ServiceError::validation(format!(
                "Password is too weak: {}",
                problems.join(", ")
            )));
        }
        if request.password != request.confirm_password {
            return Err(ServiceError::validation("Passwords do not match"));
        }

        let email = request.email.trim().to_string();
        let username = request.username.trim().to_string();
        if self.users.identity_exists(&email, &username).await? {
            return Err(ServiceError::validation("Registration failed"));
        }

        // Administrators are never self-registered.
        let role = match UserRole::from_request(request.role.as_deref()) {
            UserRole::Admin => UserRole::User,
            role => role,
        };

        let password_hash = hash_password(&request.password, self.state.config.bcrypt_cost)?;
        let verification_token = generate_random_string(VERIFICATION_TOKEN_LENGTH);
        let user = self
            .users
            .create_user(CreateUser {
                id: uuid::Uuid::now_v7().to_string(),
                username,
                email,
                phone: request.phone.filter(|p| !p.trim().is_empty()),
                password_hash,
                role,
                email_verification_token: verification_token.clone(),
                email_token_expiry: Utc::now()
                    + seconds(self.state.config.email_verification_ttl_seconds),
            })
            .await
            .map_err(|e| {
                // A concurrent signup can claim the identity after the check above.
                if is_unique_violation(&e) {
                    ServiceError::validation("Registration failed")
                } else {
                    ServiceError::from(e)
                }
            })?;

        if let Some(email_service) = self.state.email.clone() {
            let (to, username) = (user.email.clone(), user.username.clone());
            tokio::spawn(async move {
                if let Err(e) = email_service
                    .send_verification_email(&to, &username, &verification_token)
                    .await
                {
                    tracing::warn!("Failed to send verification email to {}: {}", to, e);
                }
            });
        }

        self.audit(
            AuditEntry::new(AuditEvent::Signup, "Account created")
                .user(&user)
                .client(client),
        )
        .await;

        Ok(UserIdResponse { user_id: user.id })
    }

    /// Issue a one-time reset code for the account behind `email`.
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
        client: &ClientInfo,
    ) -> ServiceResult<UserIdResponse> {
        request
            .validate()
            .map_err(|e| ServiceError::validation(validation_message(&e)))?;

        let user = self
            .users
            .get_user_by_email(request.email.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let otp = generate_otp();
        let ttl = self.state.config.otp_ttl_seconds;
        self.users
            .set_reset_token(&user.id, &otp, Utc::now() + seconds(ttl))
            .await?;

        if let Some(email_service) = self.state.email.clone() {
            let (to, username) = (user.email.clone(), user.username.clone());
            tokio::spawn(async move {
                if let Err(e) = email_service
                    .send_password_reset_otp(&to, &username, &otp, ttl.div_ceil(60))
                    .await
                {
                    tracing::warn!("Failed to send password reset code to {}: {}", to, e);
                }
            });
        }

        self.audit(
            AuditEntry::new(AuditEvent::PasswordResetRequest, "Password reset requested")
                .user(&user)
                .client(client),
        )
        .await;

        Ok(UserIdResponse { user_id: user.id })
    }

    /// Consume a reset code and set a new password. `path_user_id` takes
    /// precedence over a `userId` in the body.
    pub async fn reset_password(
        &self,
        path_user_id: Option<String>,
        request: ResetPasswordRequest,
        client: &ClientInfo,
    ) -> ServiceResult<()> {
        let user_id = path_user_id.or(request.user_id).filter(|v| !v.is_empty());
        let token = request.token.filter(|v| !v.is_empty());
        let password = request.password.filter(|v| !v.is_empty());
        let (Some(user_id), Some(token), Some(password)) = (user_id, token, password) else {
            return Err(ServiceError::validation(
                "Token, password and user id are required",
            ));
        };

        let Some(user) = self.users.get_user_by_id(&user_id).await? else {
            return Err(ServiceError::validation("User not found"));
        };

        let code_matches = user.reset_token.as_deref() == Some(token.as_str());
        let code_live = user.otp_expiry.is_some_and(|expiry| expiry > Utc::now());
        if !code_matches || !code_live {
            self.audit(
                AuditEntry::new(AuditEvent::PasswordResetFailure, "Invalid or expired reset code")
                    .user(&user)
                    .client(client),
            )
            .await;
            return Err(ServiceError::authentication_required(
                "Invalid or expired token",
            ));
        }

        if let Err(problems) = check_password_strength(&password) {
            return Err(ServiceError::validation(format!(
                "Password is too weak: {}",
                problems.join(", ")
            )));
        }

        let password_hash = hash_password(&password, self.state.config.bcrypt_cost)?;
        self.users.reset_password(&user.id, &password_hash).await?;

        self.audit(
            AuditEntry::new(AuditEvent::PasswordResetSuccess, "Password reset")
                .user(&user)
                .client(client),
        )
        .await;

        Ok(())
    }

    /// Revoke whatever session cookies were presented. Never fails.
    pub async fn logout(
        &self,
        access_token: Option<String>,
        refresh_token: Option<String>,
        client: &ClientInfo,
    ) {
        let jwt = &self.state.jwt;
        let mut user_id = None;

        if let Some(token) = access_token.as_deref() {
            if let Some(claims) = jwt.peek(token, TokenType::Access) {
                self.state.blacklist.revoke(token, claims.exp);
                user_id = Some(claims.sub);
            }
        }

        if let Some(token) = refresh_token.as_deref() {
            if let Some(claims) = jwt.peek(token, TokenType::Refresh) {
                self.state.blacklist.revoke(token, claims.exp);
                let id = claims.sub;
                if user_id.is_none() {
                    user_id = Some(id.clone());
                }

                let pool = self.state.pool.clone();
                tokio::spawn(async move {
                    if let Err(e) = UserRepository::new(&pool).clear_refresh_token(&id).await {
                        tracing::warn!("Failed to clear refresh token for {}: {:#}", id, e);
                    }
                });
            }
        }

        if let Some(user_id) = user_id {
            self.audit(
                AuditEntry::new(AuditEvent::Logout, "Logged out")
                    .user_id(user_id)
                    .client(client),
            )
            .await;
        }
    }

    /// Establish the caller's identity from the session cookies, rotating
    /// the pair if the access token has expired.
    pub async fn authenticate(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        client: &ClientInfo,
    ) -> ServiceResult<SessionOutcome> {
        let Some(access_token) = access_token else {
            return Err(ServiceError::authentication_required(
                "Authentication required.",
            ));
        };
        if self.state.blacklist.is_revoked(access_token) {
            return Err(ServiceError::authentication_required(
                "Token is no longer valid.",
            ));
        }

        let (user_id, refreshed) = match self
            .state
            .jwt
            .validate_token(access_token, TokenType::Access)
        {
            Ok(claims) => (claims.sub, None),
            Err(TokenError::Expired) => match refresh_token {
                Some(refresh_token) => {
                    let (user, tokens) = self.refresh_session(refresh_token, client).await?;
                    (user.id, Some(tokens))
                }
                None => return Err(ServiceError::TokenExpired),
            },
            Err(_) => {
                return Err(ServiceError::authentication_required(
                    "Invalid authentication token.",
                ));
            }
        };

        let Some(user) = self.users.get_user_by_id(&user_id).await? else {
            return Err(ServiceError::authentication_required(
                "User no longer exists.",
            ));
        };
        if user.account_locked {
            return Err(ServiceError::account_locked("Your account is locked."));
        }

        Ok(SessionOutcome {
            context: AuthContext {
                user_id: user.id,
                role: user.role,
            },
            refreshed,
        })
    }

    /// Exchange a refresh token for a new pair. Only the most recently issued
    /// refresh token of an account is accepted.
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> ServiceResult<(User, TokenPair)> {
        if self.state.blacklist.is_revoked(refresh_token) {
            return Err(ServiceError::authentication_required(
                "Refresh token is no longer valid.",
            ));
        }

        let claims = self
            .state
            .jwt
            .validate_token(refresh_token, TokenType::Refresh)
            .map_err(|_| ServiceError::authentication_required("Invalid refresh token."))?;

        let Some(user) = self.users.get_user_by_id(claims.user_id()).await? else {
            return Err(ServiceError::authentication_required(
                "Invalid refresh token.",
            ));
        };

        let current = user.refresh_token.as_deref() == Some(refresh_token)
            && user.refresh_token_expiry.map(|e| e.timestamp()) == Some(claims.exp);
        if !current {
            self.audit(
                AuditEntry::new(
                    AuditEvent::SuspiciousActivity,
                    "Refresh token does not match the current session",
                )
                .user(&user)
                .client(client),
            )
            .await;
            return Err(ServiceError::authentication_required(
                "Invalid refresh token.",
            ));
        }

        let tokens = self.issue_session(&user).await?;
        self.audit(
            AuditEntry::new(AuditEvent::TokenRefresh, "Session refreshed")
                .user(&user)
                .client(client),
        )
        .await;

        Ok((user, tokens))
    }

    pub async fn verify_email(&self, token: &str, client: &ClientInfo) -> ServiceResult<()> {
        let invalid = || ServiceError::validation("Invalid or expired verification token");

        let user = self
            .users
            .get_user_by_verification_token(token)
            .await?
            .ok_or_else(invalid)?;
        if !user.email_token_expiry.is_some_and(|e| e > Utc::now()) {
            return Err(invalid());
        }

        self.users.mark_email_verified(&user.id).await?;
        self.audit(
            AuditEntry::new(AuditEvent::EmailVerification, "Email verified")
                .user(&user)
                .client(client),
        )
        .await;

        Ok(())
    }

    /// Administrative unlock of an account.
    pub async fn unlock_account(
        &self,
        actor: &AuthContext,
        user_id: &str,
        client: &ClientInfo,
    ) -> ServiceResult<()> {
        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        self.users
            .update_lockout(&user.id, &LockoutState::cleared())
            .await?;
        self.audit(
            AuditEntry::new(
                AuditEvent::AccountUnlocked,
                format!("Unlocked by administrator {}", actor.user_id),
            )
            .user(&user)
            .client(client),
        )
        .await;

        Ok(())
    }

    pub async fn current_user(&self, context: &AuthContext) -> ServiceResult<CurrentUser> {
        let user = self
            .users
            .get_user_by_id(&context.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        let bookings = self.users.get_booking_ids(&user.id).await?;

        Ok(CurrentUser::new(user, bookings))
    }

    /// Mint a pair and make its refresh token the only valid one.
    async fn issue_session(&self, user: &User) -> ServiceResult<TokenPair> {
        let tokens = self
            .state
            .jwt
            .issue(&user.id)
            .map_err(|e| ServiceError::internal_error(e.to_string()))?;
        self.users
            .set_refresh_token(&user.id, &tokens.refresh_token, tokens.refresh_expires_at)
            .await?;
        Ok(tokens)
    }

    async fn audit(&self, entry: AuditEntry) {
        self.state.audit.record(entry).await;
    }
}

fn validation_message(errors: &ValidationErrors) -> String {
    validation_errors_to_field_errors(errors)
        .into_iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join(", ")
}

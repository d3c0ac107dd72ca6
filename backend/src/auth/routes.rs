//! Defines the HTTP routes for authentication.
//!
//! Mounted under `/api/auth` by `api::app_router`. The router expects an
//! `Extension<AppState>` layer to be applied by the caller.

use crate::auth::handlers::*;
use crate::auth::middleware::*;
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword", patch(reset_password_by_body))
        .route("/resetPassword/{user_id}", patch(reset_password))
        .route("/verifyEmail/{token}", get(verify_email))
        .route("/me", get(me).layer(middleware::from_fn(protect_route)))
        .route(
            "/unlock/{user_id}",
            patch(unlock_account)
                .layer(middleware::from_fn(require_admin))
                .layer(middleware::from_fn(protect_route)),
        )
}

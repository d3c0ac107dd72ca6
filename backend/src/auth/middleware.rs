//! Middleware for protecting authenticated routes and handling authorization.
//!
//! `protect_route` turns session cookies into an [`AuthContext`] request
//! extension, transparently rotating the token pair when only the access
//! token has expired. Role guards layered inside it read that context.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::common::service_error_to_http;
use crate::auth::audit::ClientInfo;
use crate::auth::cookies::{ACCESS_COOKIE, REFRESH_COOKIE, append_session_cookies, read_cookie};
use crate::auth::models::AuthContext;
use crate::auth::service::AuthService;
use crate::auth::state::AppState;
use crate::database::models::UserRole;
use crate::errors::ServiceError;

/// Session guard for cookie-authenticated routes.
pub async fn protect_route(
    Extension(state): Extension<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let access_token = read_cookie(headers, ACCESS_COOKIE);
    let refresh_token = read_cookie(headers, REFRESH_COOKIE);
    let client = ClientInfo::from_headers(headers);

    let outcome = match AuthService::new(&state)
        .authenticate(access_token.as_deref(), refresh_token.as_deref(), &client)
        .await
    {
        Ok(outcome) => outcome,
        Err(error) => return service_error_to_http(error, state.verbose_errors()).into_response(),
    };

    request.extensions_mut().insert(outcome.context);
    let mut response = next.run(request).await;

    if let Some(tokens) = outcome.refreshed {
        if let Err(e) = append_session_cookies(
            response.headers_mut(),
            &tokens,
            state.jwt.access_ttl().num_seconds(),
            state.jwt.refresh_ttl().num_seconds(),
            state.secure_cookies(),
        ) {
            tracing::error!("Failed to set refreshed session cookies: {}", e);
        }
    }

    response
}

/// Rejects callers whose role is not in `allowed`. Must run inside
/// [`protect_route`].
pub async fn require_roles(allowed: &'static [UserRole], request: Request, next: Next) -> Response {
    let Some(context) = request.extensions().get::<AuthContext>() else {
        return service_error_to_http(
            ServiceError::authentication_required("Authentication required."),
            false,
        )
        .into_response();
    };

    if !allowed.contains(&context.role) {
        return service_error_to_http(
            ServiceError::permission_denied("You do not have permission to perform this action"),
            false,
        )
        .into_response();
    }

    next.run(request).await
}

/// Admin role authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Response {
    require_roles(&[UserRole::Admin], request, next).await
}

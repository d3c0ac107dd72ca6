//! Handler functions for authentication-related API endpoints.
//!
//! These functions read cookies, client details and request bodies, delegate
//! to `auth::service`, and shape the result into the JSON envelope plus any
//! `Set-Cookie` headers.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::Json as ResponseJson,
};

use crate::api::common::{ApiResponse, HttpError, JsonBody, service_error_to_http};
use crate::auth::audit::ClientInfo;
use crate::auth::cookies::{
    ACCESS_COOKIE, REFRESH_COOKIE, append_cleared_cookies, append_session_cookies, read_cookie,
};
use crate::auth::models::*;
use crate::auth::service::AuthService;
use crate::auth::state::AppState;
use crate::errors::ServiceError;

type CookieResponse<T> = Result<(HeaderMap, ResponseJson<ApiResponse<T>>), HttpError>;

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> CookieResponse<LoginResponse> {
    let verbose = state.verbose_errors();
    let client = ClientInfo::from_headers(&headers);

    let outcome = AuthService::new(&state)
        .login(payload, &client)
        .await
        .map_err(|e| service_error_to_http(e, verbose))?;

    let mut cookies = HeaderMap::new();
    append_session_cookies(
        &mut cookies,
        &outcome.tokens,
        state.jwt.access_ttl().num_seconds(),
        state.jwt.refresh_ttl().num_seconds(),
        state.secure_cookies(),
    )
    .map_err(|e| service_error_to_http(ServiceError::internal_error(e.to_string()), verbose))?;

    let body = LoginResponse {
        user: UserInfo::from(&outcome.user),
    };
    Ok((
        cookies,
        ResponseJson(ApiResponse::success(body, "Login successful")),
    ))
}

/// Handle user registration request
#[axum::debug_handler]
pub async fn signup(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<UserIdResponse>>), HttpError> {
    let client = ClientInfo::from_headers(&headers);

    match AuthService::new(&state).signup(payload, &client).await {
        Ok(response) => Ok((
            StatusCode::CREATED,
            ResponseJson(ApiResponse::success(
                response,
                "Registration successful. Please check your email to verify your account.",
            )),
        )),
        Err(error) => Err(service_error_to_http(error, state.verbose_errors())),
    }
}

/// Handle logout request. Always succeeds and always clears both cookies.
#[axum::debug_handler]
pub async fn logout(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> CookieResponse<()> {
    let client = ClientInfo::from_headers(&headers);
    AuthService::new(&state)
        .logout(
            read_cookie(&headers, ACCESS_COOKIE),
            read_cookie(&headers, REFRESH_COOKIE),
            &client,
        )
        .await;

    let mut cookies = HeaderMap::new();
    append_cleared_cookies(&mut cookies, state.secure_cookies()).map_err(|e| {
        service_error_to_http(
            ServiceError::internal_error(e.to_string()),
            state.verbose_errors(),
        )
    })?;

    Ok((
        cookies,
        ResponseJson(ApiResponse::<()>::message("Logged out successfully")),
    ))
}

/// Handle forgot-password request
#[axum::debug_handler]
pub async fn forgot_password(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<UserIdResponse>>, HttpError> {
    let client = ClientInfo::from_headers(&headers);

    match AuthService::new(&state)
        .forgot_password(payload, &client)
        .await
    {
        Ok(response) => Ok(ResponseJson(ApiResponse::success(
            response,
            "A password reset code has been sent to your email",
        ))),
        Err(error) => Err(service_error_to_http(error, state.verbose_errors())),
    }
}

/// Handle password reset with the user id in the path
#[axum::debug_handler]
pub async fn reset_password(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, HttpError> {
    reset(&state, Some(user_id), &headers, payload).await
}

/// Handle password reset with the user id in the body
#[axum::debug_handler]
pub async fn reset_password_by_body(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, HttpError> {
    reset(&state, None, &headers, payload).await
}

async fn reset(
    state: &AppState,
    user_id: Option<String>,
    headers: &HeaderMap,
    payload: ResetPasswordRequest,
) -> Result<ResponseJson<ApiResponse<()>>, HttpError> {
    let client = ClientInfo::from_headers(headers);

    AuthService::new(state)
        .reset_password(user_id, payload, &client)
        .await
        .map(|_| ResponseJson(ApiResponse::<()>::message("Password reset successful")))
        .map_err(|e| service_error_to_http(e, state.verbose_errors()))
}

/// Handle email verification link
#[axum::debug_handler]
pub async fn verify_email(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<()>>, HttpError> {
    let client = ClientInfo::from_headers(&headers);

    match AuthService::new(&state).verify_email(&token, &client).await {
        Ok(()) => Ok(ResponseJson(ApiResponse::<()>::message(
            "Email verified successfully",
        ))),
        Err(error) => Err(service_error_to_http(error, state.verbose_errors())),
    }
}

/// Get current user information
#[axum::debug_handler]
pub async fn me(
    Extension(state): Extension<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<ResponseJson<ApiResponse<CurrentUser>>, HttpError> {
    match AuthService::new(&state).current_user(&context).await {
        Ok(user) => Ok(ResponseJson(ApiResponse::success(
            user,
            "User retrieved successfully",
        ))),
        Err(error) => Err(service_error_to_http(error, state.verbose_errors())),
    }
}

/// Clear a lockout on behalf of an administrator
#[axum::debug_handler]
pub async fn unlock_account(
    Extension(state): Extension<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<()>>, HttpError> {
    let client = ClientInfo::from_headers(&headers);

    match AuthService::new(&state)
        .unlock_account(&context, &user_id, &client)
        .await
    {
        Ok(()) => Ok(ResponseJson(ApiResponse::<()>::message(
            "Account unlocked successfully",
        ))),
        Err(error) => Err(service_error_to_http(error, state.verbose_errors())),
    }
}

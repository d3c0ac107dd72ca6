//! Top-level HTTP surface.
//!
//! Assembles the auth routes under `/api/auth` and applies the shared layers:
//! request tracing, credentialed CORS for the frontend origin, and the
//! `AppState` extension every handler reads.

pub mod common;

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::Json,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::api::common::ApiResponse;
use crate::auth::{routes::auth_router, state::AppState};

/// Builds the application router for the given state.
pub fn app_router(state: AppState) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .client_url
        .trim_end_matches('/')
        .parse()
        .with_context(|| format!("CLIENT_URL is not a valid origin: {}", state.config.client_url))?;

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    Ok(Router::new()
        .route("/", get(root_handler))
        .nest("/api/auth", auth_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(Extension(state)),
        ))
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
        "Welcome to the portfolio auth API",
    ))
}

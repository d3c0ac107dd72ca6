//! Response envelope and error conversion for API handlers.
//!
//! Every JSON body produced by the service, success or failure, is an
//! `ApiResponse`:
//! - `success`: whether the request succeeded
//! - `message`: human-readable message
//! - `data`: payload on success
//! - `error.error_type`: machine-readable category on failure
//! - `error.details`: field-level validation messages when applicable
//!
//! # Error Handling Flow
//! 1. Service layer returns a `ServiceError`
//! 2. `service_error_to_http` maps it to a status code and an error envelope
//! 3. Internal failures are sanitized unless verbose errors are enabled
//!
//! Request bodies are read through `JsonBody`, so a malformed body is
//! reported in the same envelope as any other failure.

use crate::errors::ServiceError;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Standard API response wrapper for all endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Indicates if the request was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message
    pub message: String,
    /// Error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Response timestamp
    pub timestamp: String,
}

/// Error details for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error type identifier
    pub error_type: String,
    /// Field-specific validation errors when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Field-specific validation error details
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error half of every handler result.
pub type HttpError = (StatusCode, Json<ApiResponse<()>>);

/// Works like `axum::Json<T>`, but a rejected body is answered with the
/// `ApiResponse` envelope rather than axum's plain-text message.
pub struct JsonBody<T>(pub T);

/// A body that is not JSON, has no JSON content type, or does not match the
/// expected shape. Keeps the status axum chose for it.
#[derive(Debug)]
pub struct JsonBodyRejection {
    status: StatusCode,
    message: String,
}

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = JsonBodyRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

impl From<JsonRejection> for JsonBodyRejection {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for JsonBodyRejection {
    fn into_response(self) -> Response {
        tracing::debug!("Rejected request body: {}", self.message);
        (
            self.status,
            Json(ApiResponse::<()>::error(
                self.message,
                "validation_error",
                None,
            )),
        )
            .into_response()
    }
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    /// Create a successful response without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: message.into(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create an error response
    pub fn error(
        message: impl Into<String>,
        error_type: impl Into<String>,
        details: Option<Vec<FieldError>>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
            error: Some(ErrorDetails {
                error_type: error_type.into(),
                details,
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts a ServiceError to an HTTP status and error envelope.
///
/// With `verbose` unset, database and internal failures carry only a generic
/// message; the cause is logged instead.
pub fn service_error_to_http(error: ServiceError, verbose: bool) -> HttpError {
    let error_type = error.error_type();
    let (status, message) = match error {
        ServiceError::AuthenticationRequired { message } => (StatusCode::UNAUTHORIZED, message),
        ServiceError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "Authentication required.".to_string(),
        ),
        ServiceError::AccountLocked { message } => (StatusCode::UNAUTHORIZED, message),
        ServiceError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        ServiceError::Validation { message } => (StatusCode::BAD_REQUEST, message),
        ServiceError::NotFound { entity } => (StatusCode::NOT_FOUND, format!("{entity} not found")),
        ServiceError::PermissionDenied { message } => (StatusCode::FORBIDDEN, message),
        ServiceError::Database { source } => {
            tracing::error!("Database error: {:#}", source);
            let message = if verbose {
                format!("Database error: {source:#}")
            } else {
                "Internal server error".to_string()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        ServiceError::Internal { message } => {
            tracing::error!("Internal error: {}", message);
            let message = if verbose {
                message
            } else {
                "Internal server error".to_string()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    };

    (status, Json(ApiResponse::<()>::error(message, error_type, None)))
}

/// Flattens validator::ValidationErrors into per-field messages
pub fn validation_errors_to_field_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::header;
    use serde_json::Value;

    async fn rejected_body(request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = match JsonBody::<Value>::from_request(request, &()).await {
            Ok(_) => panic!("body should have been rejected"),
            Err(rejection) => rejection.into_response(),
        };
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn malformed_json_body_is_enveloped() {
        let request = axum::http::Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, content_type, body) = rejected_body(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["error_type"], "validation_error");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_is_enveloped() {
        let request = axum::http::Request::builder()
            .body(Body::from(r#"{"email":"a@x.com"}"#))
            .unwrap();
        let (status, _, body) = rejected_body(request).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["success"], false);
    }

    #[test]
    fn internal_errors_are_sanitized_unless_verbose() {
        let (status, Json(body)) =
            service_error_to_http(ServiceError::internal_error("smtp exploded"), false);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Internal server error");
        assert!(!body.success);

        let (_, Json(body)) =
            service_error_to_http(ServiceError::internal_error("smtp exploded"), true);
        assert_eq!(body.message, "smtp exploded");
    }

    #[test]
    fn invalid_credentials_and_lockout_are_both_unauthorized() {
        let (status, Json(body)) = service_error_to_http(ServiceError::InvalidCredentials, false);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.message, "Invalid credentials");
        assert_eq!(body.error.unwrap().error_type, "invalid_credentials");

        let (status, _) =
            service_error_to_http(ServiceError::account_locked("locked"), false);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn not_found_maps_to_404() {
        let (status, Json(body)) = service_error_to_http(ServiceError::not_found("User"), false);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "User not found");
    }

    #[test]
    fn field_errors_keep_custom_messages() {
        #[derive(validator::Validate)]
        struct EmailOnly {
            #[validate(length(min = 1, message = "Email is required"))]
            email: String,
        }

        let errors = validator::Validate::validate(&EmailOnly {
            email: String::new(),
        })
        .unwrap_err();
        let fields = validation_errors_to_field_errors(&errors);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "email");
        assert_eq!(fields[0].message, "Email is required");
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parley_coord::CoordError;
use parley_store::StoreError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired credential")]
    InvalidCredential,

    #[error("Rate limit exceeded. Please slow down.")]
    RateLimited,

    #[error("Not a member of this group")]
    NotAMember,

    #[error("Not found")]
    NotFound,

    #[error("Coordination store unavailable")]
    StoreUnavailable(#[from] CoordError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Unauthenticated | GatewayError::InvalidCredential => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            GatewayError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            GatewayError::NotAMember => (StatusCode::FORBIDDEN, self.to_string()),
            GatewayError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            GatewayError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            GatewayError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use insight_dataset::DatasetError;

/// Field name -> message, as shown next to the offending form field.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, or not visible to the caller.
    #[error("not found")]
    NotFound,

    #[error("authentication required")]
    Unauthorized,

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Logged server-side, never shown to the client.
    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(BTreeMap::from([(field, message.into())]))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Errors raised inside a database closure travel through `anyhow`; an
/// `ApiError` wrapped that way comes back out unchanged.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<ApiError>() {
            Ok(api) => api,
            Err(e) => Self::Internal(e),
        }
    }
}

impl From<DatasetError> for ApiError {
    fn from(e: DatasetError) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                json!({ "error": { "code": code, "message": "An internal error occurred" } })
            }
            Self::Validation(fields) => {
                warn!("Validation failed: {:?}", fields);
                json!({ "error": { "code": code, "message": self.to_string(), "fields": fields } })
            }
            other => json!({ "error": { "code": code, "message": other.to_string() } }),
        };

        (status, Json(body)).into_response()
    }
}

use crate::store::{FieldErrors, StoreError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lovenote_mailer::DeliveryError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Please fill all fields")]
    MissingFields,

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Duplicate key on {}", .fields.join(","))]
    DuplicateKey { fields: Vec<String> },

    #[error("invalid token")]
    InvalidToken,

    #[error("jwt expired")]
    ExpiredToken,

    #[error("Validation Error")]
    Validation { errors: FieldErrors },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Store(sqlx::Error),

    #[error("{message}")]
    Unclassified {
        status: Option<StatusCode>,
        message: String,
    },
}

impl ApiError {
    /// The status an error carries on its own, used when no rule classifies it.
    fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::MissingFields => Some(StatusCode::BAD_REQUEST),
            ApiError::Unclassified { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => ApiError::Validation { errors },
            StoreError::DuplicateKey { fields } => ApiError::DuplicateKey { fields },
            StoreError::Database(err) => ApiError::Store(err),
        }
    }
}

/// JSON envelope of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: None,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Classifies an error into a status and body. The first matching rule wins.
pub fn map_error(err: &ApiError) -> (StatusCode, ErrorBody) {
    tracing::error!(error = ?err, "Error middleware: {err}");

    let message = err.to_string();
    if message.contains("Resource not found") {
        let path = match err {
            ApiError::NotFound { path } => path.as_str(),
            _ => "resource",
        };
        return (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(format!("Resource not found. Invalid {path}")),
        );
    }

    match err {
        ApiError::DuplicateKey { fields } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(format!("Duplicate {} Entered", fields.join(","))),
        ),
        ApiError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::new("Json Web Token is invalid, Try again!"),
        ),
        ApiError::ExpiredToken => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::new("Json Web Token is expired, Try again!"),
        ),
        ApiError::Validation { errors } => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                errors: Some(errors.clone()),
                ..ErrorBody::new("Validation Error")
            },
        ),
        _ => {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let message = if message.is_empty() {
                "Internal Server Error".to_string()
            } else {
                message
            };
            (status, ErrorBody::new(message))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = map_error(&self);
        (status, Json(body)).into_response()
    }
}

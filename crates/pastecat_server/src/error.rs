//! Mapping of store errors onto plain-text HTTP responses.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pastecat_core::{AppError, FIELD_NAME};

const INVALID_ID: &str = "Invalid paste id.";
const NOT_FOUND: &str = "Paste doesn't exist.";
const UNKNOWN_ERROR: &str = "Something went terribly wrong.";

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum HttpError {
    App(AppError),
    /// The posted form had no paste field.
    MissingForm,
    /// The request body could not be read as a multipart form.
    Multipart { status: StatusCode, message: String },
    /// A blocking store task panicked or was cancelled.
    TaskFailed(String),
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<MultipartError> for HttpError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for HttpError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}

impl HttpError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::App(err) => match err {
                AppError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND.to_string()),
                AppError::InvalidId(_) => (StatusCode::BAD_REQUEST, INVALID_ID.to_string()),
                AppError::EmptyPaste => (StatusCode::BAD_REQUEST, err.to_string()),
                AppError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
                err if err.is_capacity() => {
                    tracing::warn!("Refusing paste: {}", err);
                    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
                }
                err => {
                    tracing::error!("Store error: {}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR.to_string())
                }
            },
            Self::MissingForm => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Field '{}' could not be found inside the posted form.",
                    FIELD_NAME
                ),
            ),
            Self::Multipart { status, message } => (*status, message.clone()),
            Self::TaskFailed(message) => {
                tracing::error!("Store task failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR.to_string())
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, format!("{}\n", message)).into_response()
    }
}

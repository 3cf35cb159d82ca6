use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failures of the gateway workflows and their collaborators.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("request to storage backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage backend answered {status} to {method} {uri}")]
    BackendStatus {
        method: String,
        uri: String,
        status: u16,
    },
    #[error("a document with path `{0}` already exists")]
    DocumentConflict(String),
    #[error("document {0} not found")]
    DocumentNotFound(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::DocumentConflict(_) => StatusCode::CONFLICT,
            GatewayError::Transport(_) | GatewayError::BackendStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Config(_) | GatewayError::Signing(_) | GatewayError::Sqlx(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("request failed: {}", err);
        }
        AppError::new(status, err.to_string())
    }
}

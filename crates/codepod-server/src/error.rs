//! Error types for codepod-server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listen address did not parse.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime error.
    #[error("{0}")]
    Core(#[from] codepod_core::Error),

    /// Inbound frame was not a valid command.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] serde_json::Error),

    /// No kernel registered under the requested key.
    #[error("no kernel for {0}")]
    KernelNotFound(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCommand(_) => StatusCode::BAD_REQUEST,
            Self::Core(codepod_core::Error::UnsupportedLanguage(_)) => StatusCode::BAD_REQUEST,
            Self::KernelNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short name used as `ename` when the error is reported to a client.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCommand(_) => "InvalidCommand",
            Self::KernelNotFound(_) => "KernelNotFound",
            Self::Core(e) => e.kind(),
            Self::InvalidAddress(_) | Self::Io(_) => "ServerError",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

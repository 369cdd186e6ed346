use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy of the learning engine. Every variant maps to a stable
/// machine-readable code so callers can branch without parsing messages.
///
/// Running out of hearts is intentionally NOT an error: it is a flagged
/// outcome on a successful answer submission (`out_of_hearts: true`), so the
/// surrounding system can route the user to an alternate flow.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing attempt/question/lesson, or an attempt not owned by the
    /// caller. Ownership mismatches are reported identically to "missing"
    /// so existence of other users' attempts never leaks.
    #[error("{0}")]
    NotFound(String),

    /// The operation is not legal in the attempt's current state
    /// (e.g. submitting an answer on a finished attempt).
    #[error("{0}")]
    InvalidState(String),

    /// The request itself is malformed: unsupported mode, non-positive
    /// question count, or a mode with no content in the pool.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] mongodb::error::Error),

    #[error(transparent)]
    Serialization(#[from] mongodb::bson::ser::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::InvalidState(_) => "INVALID_STATE",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Database(_) | EngineError::Serialization(_) | EngineError::Internal(_) => {
                "INTERNAL"
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidState(_) => StatusCode::CONFLICT,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Database(_) | EngineError::Serialization(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Engine internal error: {}", self);
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Storage details stay in the logs
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "code": self.code(),
            "message": message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

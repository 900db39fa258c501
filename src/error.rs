use thiserror::Error;

use crate::lifecycle::EngineError;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convert AppError to HTTP status codes for web responses
impl AppError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(e) => match e {
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::InvalidThresholdParameters { .. } => StatusCode::BAD_REQUEST,
                EngineError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
                EngineError::NotFound => StatusCode::NOT_FOUND,
                EngineError::AlreadyFilled => StatusCode::CONFLICT,
                EngineError::NoCapacity => StatusCode::CONFLICT,
                EngineError::Closed(_) => StatusCode::CONFLICT,
                EngineError::ReconstructionFailed => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                EngineError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Caller-facing text for a status. Error detail stays in the logs.
fn public_message(status: axum::http::StatusCode) -> &'static str {
    use axum::http::StatusCode;
    match status {
        StatusCode::BAD_REQUEST => "Invalid request",
        StatusCode::NOT_FOUND => "Not found",
        StatusCode::CONFLICT => "Conflict",
        StatusCode::UNPROCESSABLE_ENTITY => "Message could not be unlocked",
        _ => "Internal server error",
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "Request rejected: {}", self);
        }
        let body = serde_json::json!({
            "error": public_message(status),
            "code": status.as_u16()
        });
        (status, axum::Json(body)).into_response()
    }
}

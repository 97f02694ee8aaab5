use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid time {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("Invalid preset catalog: {0}")]
    InvalidCatalog(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnknownTimezone(_)
            | AppError::InvalidTime { .. }
            | AppError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            AppError::JobNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Http(_) | AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

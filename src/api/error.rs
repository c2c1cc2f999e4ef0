use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or disallowed upload, caller's fault
    #[error("{0}")]
    Validation(String),

    /// Server-side misconfiguration: reference dataset or transform missing
    #[error("{0}")]
    ResourceMissing(String),

    /// Transform exited non-zero; carries the captured diagnostic text
    #[error("Transform failed:\n{0}")]
    Execution(String),

    /// Transform exceeded its time budget
    #[error("Transform timed out after {0} seconds")]
    Timeout(u64),

    /// Transform exited zero but produced no output artifact
    #[error("Transform did not produce {0}")]
    OutputMissing(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ResourceMissing(_) | AppError::Execution(_) | AppError::OutputMissing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Io(e) => {
                tracing::error!("I/O error in pipeline: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!("Pipeline failed: {}", self);
        }

        let body = Json(json!({
            "detail": self.to_string()
        }));

        (status, body).into_response()
    }
}

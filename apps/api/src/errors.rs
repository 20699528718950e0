use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::schedule::crawl::CrawlError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Every submitted extraction path failed.
    #[error("{message}: {details}")]
    ExtractionFailed { message: String, details: String },

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
            }
            AppError::ExtractionFailed { message, details } => {
                tracing::error!("Extraction failed on every path: {details}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXTRACTION_FAILED",
                    message.clone(),
                    Some(details.clone()),
                )
            }
            AppError::Crawl(e) => {
                tracing::error!("Crawl error: {e}");
                let status = match e {
                    CrawlError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                    CrawlError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    CrawlError::Http(_) | CrawlError::Status(_) => StatusCode::BAD_GATEWAY,
                };
                (
                    status,
                    "CRAWL_ERROR",
                    "The official schedule source could not be read".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "details": details,
            "code": code
        }));

        (status, body).into_response()
    }
}

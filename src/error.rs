//! Error types for the Pagewright server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::convert::ConvertError;
use crate::pages::PageError;
use crate::pdf::PdfError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unsupported file type for preview")]
    UnsupportedInputType,

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid form data: {0}")]
    Multipart(#[from] MultipartError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::UnsupportedInputType
            | AppError::Page(_)
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Pdf(PdfError::Password) => StatusCode::UNAUTHORIZED,
            AppError::Pdf(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = match &self {
            AppError::Convert(ConvertError::Failed { detail }) => {
                tracing::error!("Conversion failed: {}", detail);
                self.to_string()
            }
            AppError::Convert(e) => {
                tracing::error!("Converter error: {}", e);
                e.to_string()
            }
            AppError::Pdf(e) if status.is_server_error() => {
                tracing::error!("PDF error: {}", e);
                "Failed to process document".to_string()
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                "IO error".to_string()
            }
            AppError::Archive(e) => {
                tracing::error!("Archive error: {}", e);
                "Failed to build archive".to_string()
            }
            AppError::Spreadsheet(e) => {
                tracing::error!("Spreadsheet error: {}", e);
                "Failed to build spreadsheet".to_string()
            }
            AppError::Join(e) => {
                tracing::error!("Worker task failed: {}", e);
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::debug!("Rejected request: {}", self);
                self.to_string()
            }
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

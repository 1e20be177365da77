//! PDF error types

use thiserror::Error;

/// Errors raised by the PDF reader/writer and the rasterizer
#[derive(Debug, Error)]
pub enum PdfError {
    /// Input could not be parsed as a PDF (or image)
    #[error("Could not read document: {0}")]
    Unreadable(String),

    /// Document is encrypted and the password did not open it
    #[error("Invalid password")]
    Password,

    /// Page index outside the document
    #[error("Page {0} not found (document has {1} pages)")]
    PageNotFound(usize, usize),

    /// The object model could not be edited or serialized
    #[error("PDF processing error: {0}")]
    Processing(String),

    /// MuPDF failed to render or extract a page
    #[error("Render error: {0}")]
    Render(String),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PDF operations
pub type PdfResult<T> = std::result::Result<T, PdfError>;

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        PdfError::Processing(err.to_string())
    }
}

impl From<mupdf::Error> for PdfError {
    fn from(err: mupdf::Error) -> Self {
        PdfError::Render(err.to_string())
    }
}

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::Image(err.to_string())
    }
}

impl PdfError {
    /// Whether the error was caused by the caller's input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, PdfError::Unreadable(_) | PdfError::Password)
    }
}

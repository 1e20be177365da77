//! Route modules for Pagewright Server
//!
//! Handlers share one shape: read the form, stage the upload, run the
//! library work on a blocking worker with the staged files moved into it,
//! then stream the output file back as an attachment.

pub mod convert;
pub mod edit;
pub mod form;
pub mod health;
pub mod images;
pub mod inspect;
pub mod pages;

use axum::{response::Response, Router};

use crate::error::{AppError, Result};
use crate::pages::{assemble, Selection, Shape};
use crate::pdf::PdfDocument;
use crate::staging::{attachment, StagedFile};
use crate::state::AppState;

/// All `/api` routes
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(pages::router())
        .merge(edit::router())
        .merge(images::router())
        .merge(convert::router())
        .merge(inspect::router())
}

/// Run library work on the blocking pool
///
/// Anything moved into `work` (staged files included) is dropped on the
/// worker when it finishes, even if the request future is gone by then.
pub(crate) async fn blocking<F, R>(work: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Write `bytes` to a staged output and hand the file back
pub(crate) fn write_output(output: StagedFile, bytes: &[u8]) -> Result<StagedFile> {
    std::fs::write(output.path(), bytes)?;
    Ok(output)
}

/// Stream a staged output under its own file name
pub(crate) async fn download(file: StagedFile, content_type: &str) -> Result<Response> {
    let name = file.file_name();
    download_as(file, content_type, &name).await
}

/// Stream a staged output under a fixed download name
pub(crate) async fn download_as(
    file: StagedFile,
    content_type: &str,
    download_name: &str,
) -> Result<Response> {
    attachment(file, content_type, download_name)
        .await
        .map_err(AppError::from)
}

/// Write the selected pages of `doc` as one PDF into `output`
pub(crate) fn write_pdf(
    doc: &PdfDocument,
    selection: &Selection,
    output: StagedFile,
) -> Result<StagedFile> {
    if selection.is_empty() {
        return Err(AppError::bad_request("No pages selected"));
    }
    let artifact = assemble(doc, selection, Shape::SingleDocument)?;
    write_output(output, &artifact.bytes)
}

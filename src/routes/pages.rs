//! Page structure endpoints
//!
//! - `POST /api/merge`: concatenate uploads
//! - `POST /api/split`: one PDF per selected page, zipped
//! - `POST /api/rotate`: rotate selected pages
//! - `POST /api/organize`: reorder and delete pages
//! - `POST /api/unlock`: remove password protection

use axum::{
    extract::{Multipart, State},
    response::Response,
    routing::post,
    Router,
};

use crate::error::{AppError, Result};
use crate::pages::{
    apply, assemble, resolve, MutationSpec, RangeSpec, Selection, Shape, ZIP_CONTENT_TYPE,
};
use crate::pdf::{PdfDocument, PdfResult, PDF_CONTENT_TYPE};
use crate::state::AppState;

use super::form::FormData;
use super::{blocking, download, download_as, write_output, write_pdf};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/merge", post(merge))
        .route("/api/split", post(split))
        .route("/api/rotate", post(rotate))
        .route("/api/organize", post(organize))
        .route("/api/unlock", post(unlock))
}

async fn merge(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let uploads = form.files("files");
    if uploads.len() < 2 {
        return Err(AppError::bad_request("At least 2 PDF files required"));
    }

    let scope = state.staging().scope();
    let mut inputs = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        inputs.push(scope.stage(upload).await?);
    }
    let output = scope.allocate("merged", "pdf");

    let output = blocking(move || {
        let documents = inputs
            .iter()
            .map(|input| PdfDocument::load(input.path()))
            .collect::<PdfResult<Vec<_>>>()?;
        let merged = PdfDocument::merge(documents)?;
        write_pdf(&merged, &Selection::all(merged.page_count()), output)
    })
    .await?;

    tracing::info!(request_id = %scope.id(), files = uploads.len(), "Merged PDFs");
    download(output, PDF_CONTENT_TYPE).await
}

async fn split(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let pages = RangeSpec::parse(form.text_or("pages", "all"))?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("split_pages", "zip");

    let (output, selected) = blocking(move || {
        let doc = PdfDocument::load(input.path())?;
        let selection = resolve(&pages, doc.page_count(), None);
        if selection.is_empty() {
            return Err(AppError::bad_request("No pages selected"));
        }
        let artifact = assemble(&doc, &selection, Shape::Archive)?;
        Ok((write_output(output, &artifact.bytes)?, selection.len()))
    })
    .await?;

    tracing::info!(request_id = %scope.id(), pages = selected, "Split PDF");
    download_as(output, ZIP_CONTENT_TYPE, "split_pages.zip").await
}

async fn rotate(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let spec = MutationSpec::rotate(form.parse_or("rotation", 90i64)?)?;
    let pages = RangeSpec::parse(form.text_or("pages", "all"))?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("rotated", "pdf");

    let (output, rotated) = blocking(move || {
        let mut doc = PdfDocument::load(input.path())?;
        let selection = resolve(&pages, doc.page_count(), None);
        let rotated = apply(&mut doc, &selection, &spec)?;
        let all = Selection::all(doc.page_count());
        Ok((write_pdf(&doc, &all, output)?, rotated))
    })
    .await?;

    tracing::info!(request_id = %scope.id(), pages = rotated, "Rotated pages");
    download(output, PDF_CONTENT_TYPE).await
}

async fn organize(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let order = form
        .text("page_order")
        .filter(|order| !order.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("page_order is required"))?;
    let order = RangeSpec::parse(order)?;
    let deletions = RangeSpec::parse_optional(form.text_or("delete_pages", ""))?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("organized", "pdf");

    let output = blocking(move || {
        let doc = PdfDocument::load(input.path())?;
        let selection = resolve(&order, doc.page_count(), deletions.as_ref());
        tracing::debug!(pages = ?selection.page_numbers(), "Organized page order");
        write_pdf(&doc, &selection, output)
    })
    .await?;

    tracing::info!(request_id = %scope.id(), "Organized PDF");
    download(output, PDF_CONTENT_TYPE).await
}

async fn unlock(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let password = form.text_or("password", "").to_string();

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("unlocked", "pdf");

    let output = blocking(move || {
        let doc = PdfDocument::load_with_password(input.path(), &password)?;
        write_pdf(&doc, &Selection::all(doc.page_count()), output)
    })
    .await?;

    tracing::info!(request_id = %scope.id(), "Unlocked PDF");
    download(output, PDF_CONTENT_TYPE).await
}

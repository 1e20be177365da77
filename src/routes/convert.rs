//! Format conversion endpoints
//!
//! Office formats are converted by the configured [`DocumentConverter`],
//! web pages by the configured [`UrlRenderer`].
//!
//! [`DocumentConverter`]: crate::convert::DocumentConverter
//! [`UrlRenderer`]: crate::convert::UrlRenderer

use axum::{
    extract::{Multipart, State},
    response::Response,
    routing::post,
    Router,
};

use crate::convert::{is_web_url, write_pages_xlsx, TargetFormat};
use crate::error::{AppError, Result};
use crate::pdf::{PdfResult, PDF_CONTENT_TYPE};
use crate::raster::Rasterizer;
use crate::staging::{RequestScope, Role, StagedFile};
use crate::state::AppState;

use super::form::FormData;
use super::{blocking, download};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pdf-to-word", post(pdf_to_word))
        .route("/api/pdf-to-ppt", post(pdf_to_ppt))
        .route("/api/pdf-to-excel", post(pdf_to_excel))
        .route("/api/word-to-pdf", post(to_pdf))
        .route("/api/ppt-to-pdf", post(to_pdf))
        .route("/api/excel-to-pdf", post(to_pdf))
        .route("/api/html-to-pdf", post(html_to_pdf))
}

async fn pdf_to_word(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    convert_upload(state, multipart, TargetFormat::Docx).await
}

async fn pdf_to_ppt(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    convert_upload(state, multipart, TargetFormat::Pptx).await
}

async fn to_pdf(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    convert_upload(state, multipart, TargetFormat::Pdf).await
}

/// Stage the uploaded `file` and convert it as it is
async fn convert_upload(
    state: AppState,
    multipart: Multipart,
    format: TargetFormat,
) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = run_converter(&state, &scope, input, format).await?;

    tracing::info!(
        request_id = %scope.id(),
        format = format.extension(),
        "Converted document"
    );
    download(output, format.content_type()).await
}

/// Page text as spreadsheet rows, one per line
async fn pdf_to_excel(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("converted", "xlsx");

    let output = blocking(move || {
        let rasterizer = Rasterizer::open(input.path())?;
        let pages = (0..rasterizer.page_count())
            .map(|index| rasterizer.page_text(index))
            .collect::<PdfResult<Vec<_>>>()?;
        write_pages_xlsx(&pages, output.path())?;
        Ok(output)
    })
    .await?;

    tracing::info!(request_id = %scope.id(), "Converted PDF to spreadsheet");
    download(output, TargetFormat::Xlsx.content_type()).await
}

async fn html_to_pdf(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = FormData::read(multipart).await?;
    let url = form
        .text("url")
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::bad_request("URL is required"))?;
    if !is_web_url(url) {
        return Err(AppError::bad_request("URL must start with http:// or https://"));
    }

    let scope = state.staging().scope();
    let output = scope.allocate("webpage", "pdf");
    state.renderer().render(url, output.path()).await?;

    tracing::info!(request_id = %scope.id(), url, "Captured web page");
    download(output, PDF_CONTENT_TYPE).await
}

/// Convert a staged file into a staged `converted_*` output
///
/// The input is released once the converter is done with it.
async fn run_converter(
    state: &AppState,
    scope: &RequestScope,
    input: StagedFile,
    format: TargetFormat,
) -> Result<StagedFile> {
    let out_dir = state.staging().output_dir();
    let produced = state
        .converter()
        .convert(input.path(), format, out_dir)
        .await?;
    let produced = scope.adopt(produced, Role::Output);
    drop(input);

    let output = scope.allocate("converted", format.extension());
    tokio::fs::rename(produced.path(), output.path()).await?;
    Ok(output)
}

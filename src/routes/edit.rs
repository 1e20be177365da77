//! Text overlay endpoints
//!
//! - `POST /api/edit-pdf`: text on one page
//! - `POST /api/watermark`: translucent rotated text on selected pages
//! - `POST /api/page-numbers`: numbered footer or header on every page

use axum::{
    extract::{Multipart, State},
    response::Response,
    routing::post,
    Router,
};

use crate::error::Result;
use crate::pages::{
    apply, resolve, resolve_single, Anchor, MutationSpec, NumberPosition, RangeSpec, Rgb,
    Selection, TextStyle,
};
use crate::pdf::{PdfDocument, PDF_CONTENT_TYPE};
use crate::staging::StagedFile;
use crate::state::AppState;

use super::form::FormData;
use super::{blocking, download, write_pdf};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/edit-pdf", post(edit_pdf))
        .route("/api/watermark", post(watermark))
        .route("/api/page-numbers", post(page_numbers))
}

/// Which pages a text mutation targets
enum Target {
    /// One explicit 1-based page; out of range is an error
    Page(usize),
    Pages(RangeSpec),
}

/// Load, mutate the targeted pages and write the whole document
fn mutate_document(
    input: StagedFile,
    output: StagedFile,
    target: Target,
    spec: MutationSpec,
) -> Result<StagedFile> {
    let mut doc = PdfDocument::load(input.path())?;
    let total = doc.page_count();
    let selection = match target {
        Target::Page(page) => Selection::single(resolve_single(page, total)?),
        Target::Pages(pages) => resolve(&pages, total, None),
    };

    apply(&mut doc, &selection, &spec)?;
    write_pdf(&doc, &Selection::all(total), output)
}

async fn edit_pdf(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;

    let anchor = match form.text("position").filter(|p| !p.trim().is_empty()) {
        Some(position) => Anchor::from_token(position),
        None => Anchor::Point {
            x: form.finite_or("text_x", 100.0)?,
            y: form.finite_or("text_y", 100.0)?,
        },
    };
    let style = TextStyle::new(
        form.positive_or("text_size", 12.0)?,
        Rgb::parse(form.text_or("text_color", "#000000"))?,
    );
    let spec = MutationSpec::InsertText {
        text: form.text_or("text", "").to_string(),
        anchor,
        style,
    };
    let page: usize = form.parse_or("page_num", 1)?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("edited", "pdf");

    let output =
        blocking(move || mutate_document(input, output, Target::Page(page), spec)).await?;

    tracing::info!(request_id = %scope.id(), page, "Inserted text");
    download(output, PDF_CONTENT_TYPE).await
}

async fn watermark(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;

    let style = TextStyle::new(
        form.positive_or("font_size", 50.0)?,
        Rgb::parse(form.text_or("color", "#888888"))?,
    )
    .with_opacity(form.finite_or("opacity", 0.3)?);
    let spec = MutationSpec::Watermark {
        text: form.text_or("text", "WATERMARK").to_string(),
        anchor: Anchor::from_token(form.text_or("position", "center")),
        style,
        angle: form.finite_or("rotation", 45.0)?,
    };
    let pages = RangeSpec::parse(form.text_or("pages", "all"))?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("watermarked", "pdf");

    let output =
        blocking(move || mutate_document(input, output, Target::Pages(pages), spec)).await?;

    tracing::info!(request_id = %scope.id(), "Added watermark");
    download(output, PDF_CONTENT_TYPE).await
}

async fn page_numbers(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;

    let spec = MutationSpec::PageNumber {
        position: NumberPosition::from_token(form.text_or("position", "bottom-center")),
        template: form.text_or("format_str", "Page {n} of {total}").to_string(),
        style: TextStyle::new(
            form.positive_or("font_size", 12.0)?,
            Rgb::parse(form.text_or("color", "#000000"))?,
        ),
        start: form.parse_or("start_number", 1)?,
        skip_first: form.flag("skip_first"),
    };

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("numbered", "pdf");

    let output =
        blocking(move || mutate_document(input, output, Target::Pages(RangeSpec::All), spec))
            .await?;

    tracing::info!(request_id = %scope.id(), "Added page numbers");
    download(output, PDF_CONTENT_TYPE).await
}

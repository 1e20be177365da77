//! Document inspection endpoints
//!
//! - `POST /api/pdf-info`: page count, metadata and page sizes
//! - `POST /api/preview`: thumbnail of one PDF page or an image
//! - `POST /api/preview-all-pages`: thumbnails of every PDF page

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::raster::{image_thumbnail, DocumentInfo, Rasterizer, RenderedImage};
use crate::state::AppState;

use super::blocking;
use super::form::FormData;

/// Extensions previewed as images rather than PDFs
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Accepted thumbnail width in pixels
const WIDTH_RANGE: std::ops::RangeInclusive<u32> = 1..=2000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pdf-info", post(pdf_info))
        .route("/api/preview", post(preview))
        .route("/api/preview-all-pages", post(preview_all_pages))
}

#[derive(Serialize)]
pub struct PdfInfoResponse {
    pub filename: String,
    #[serde(flatten)]
    pub info: DocumentInfo,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    /// `data:image/jpeg;base64,...`
    pub thumbnail: String,
    pub pages: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize)]
pub struct PageThumbnail {
    /// 1-based page number
    pub page: usize,
    pub thumbnail: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize)]
pub struct AllPagesResponse {
    pub pages: usize,
    pub thumbnails: Vec<PageThumbnail>,
}

async fn pdf_info(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PdfInfoResponse>> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;

    let info = blocking(move || Ok(Rasterizer::open(input.path())?.info()?)).await?;

    tracing::info!(request_id = %scope.id(), pages = info.pages, "Read PDF info");
    Ok(Json(PdfInfoResponse {
        filename: upload.file_name,
        info,
    }))
}

fn thumbnail_width(form: &FormData, default: u32) -> Result<u32> {
    let width: u32 = form.parse_or("width", default)?;
    if !WIDTH_RANGE.contains(&width) {
        return Err(AppError::bad_request(format!(
            "width must be between {} and {}",
            WIDTH_RANGE.start(),
            WIDTH_RANGE.end()
        )));
    }
    Ok(width)
}

enum PreviewKind {
    Image,
    Pdf,
}

async fn preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let page: usize = form.parse_or("page", 0)?;
    let width = thumbnail_width(&form, 150)?;

    let kind = match upload.extension().as_deref() {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => PreviewKind::Image,
        Some("pdf") => PreviewKind::Pdf,
        _ => return Err(AppError::UnsupportedInputType),
    };

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;

    let (image, pages) = blocking(move || match kind {
        PreviewKind::Image => {
            let bytes = std::fs::read(input.path())?;
            Ok((image_thumbnail(&bytes, width)?, 1))
        }
        PreviewKind::Pdf => {
            let rasterizer = Rasterizer::open(input.path())?;
            let pages = rasterizer.page_count();
            let page = if page < pages { page } else { 0 };
            Ok((rasterizer.thumbnail(page, width)?, pages))
        }
    })
    .await?;

    tracing::debug!(request_id = %scope.id(), pages, "Rendered preview");
    Ok(Json(PreviewResponse {
        thumbnail: image.data_uri(),
        pages,
        width: image.width,
        height: image.height,
    }))
}

async fn preview_all_pages(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AllPagesResponse>> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let width = thumbnail_width(&form, 120)?;

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;

    let images: Vec<RenderedImage> =
        blocking(move || Ok(Rasterizer::open(input.path())?.thumbnails(width)?)).await?;

    tracing::debug!(request_id = %scope.id(), pages = images.len(), "Rendered page previews");
    Ok(Json(AllPagesResponse {
        pages: images.len(),
        thumbnails: images
            .into_iter()
            .enumerate()
            .map(|(index, image)| PageThumbnail {
                page: index + 1,
                thumbnail: image.data_uri(),
                width: image.width,
                height: image.height,
            })
            .collect(),
    }))
}

//! Image conversion endpoints
//!
//! - `POST /api/pdf-to-jpg`: rendered pages or embedded images, zipped
//! - `POST /api/jpg-to-pdf`: one A4 page per uploaded image

use axum::{
    extract::{Multipart, State},
    response::Response,
    routing::post,
    Router,
};

use crate::error::{AppError, Result};
use crate::pages::{assemble, image_entry_name, ArchiveWriter, Selection, Shape, ZIP_CONTENT_TYPE};
use crate::pdf::{extract_embedded_images, images_to_pdf, Orientation, PdfDocument, PDF_CONTENT_TYPE};
use crate::raster::Rasterizer;
use crate::state::AppState;

use super::form::FormData;
use super::{blocking, download, download_as, write_output, write_pdf};

/// Accepted render resolution
const DPI_RANGE: std::ops::RangeInclusive<u32> = 1..=1200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pdf-to-jpg", post(pdf_to_jpg))
        .route("/api/jpg-to-pdf", post(jpg_to_pdf))
}

async fn pdf_to_jpg(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let upload = form.file("file")?;
    let dpi: u32 = form.parse_or("dpi", 200)?;
    if !DPI_RANGE.contains(&dpi) {
        return Err(AppError::bad_request(format!(
            "dpi must be between {} and {}",
            DPI_RANGE.start(),
            DPI_RANGE.end()
        )));
    }
    let extract_images = form.flag("extract_images");

    let scope = state.staging().scope();
    let input = scope.stage(&upload).await?;
    let output = scope.allocate("pdf_images", "zip");

    let (output, entries) = blocking(move || {
        let (entries, bytes) = if extract_images {
            let doc = PdfDocument::load(input.path())?;
            let mut archive = ArchiveWriter::new();
            for image in extract_embedded_images(&doc)? {
                let name = image_entry_name(image.page_index, image.image_index, "jpg");
                archive.add_entry(&name, &image.data)?;
            }
            (archive.len(), archive.finish()?)
        } else {
            let rasterizer = Rasterizer::open(input.path())?;
            let selection = Selection::all(rasterizer.page_count());
            let artifact = assemble(&rasterizer.jpeg_pages(dpi), &selection, Shape::Archive)?;
            (selection.len(), artifact.bytes)
        };
        Ok((write_output(output, &bytes)?, entries))
    })
    .await?;

    tracing::info!(
        request_id = %scope.id(),
        entries,
        extract_images,
        dpi,
        "Converted PDF to images"
    );
    download_as(output, ZIP_CONTENT_TYPE, "pdf_images.zip").await
}

async fn jpg_to_pdf(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut form = FormData::read(multipart).await?;
    let uploads = form.files("files");
    if uploads.is_empty() {
        return Err(AppError::bad_request("No files provided"));
    }
    let orientation = Orientation::from_token(form.text_or("orientation", "portrait"));
    let margin: f32 = form.parse_or("margin", 20.0)?;

    let scope = state.staging().scope();
    let mut inputs = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        inputs.push(scope.stage(upload).await?);
    }
    let output = scope.allocate("images", "pdf");

    let output = blocking(move || {
        let images = inputs
            .iter()
            .map(|input| std::fs::read(input.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        let doc = images_to_pdf(&images, orientation, margin)?;
        write_pdf(&doc, &Selection::all(doc.page_count()), output)
    })
    .await?;

    tracing::info!(request_id = %scope.id(), images = uploads.len(), "Converted images to PDF");
    download(output, PDF_CONTENT_TYPE).await
}

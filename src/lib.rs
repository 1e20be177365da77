//! Pagewright Server Library
//!
//! PDF toolkit over HTTP: merge, split, rotate, organize, watermark,
//! paginate, rasterize and convert documents. The binary in `main.rs`
//! only loads configuration and serves [`app`].
//!
//! # Modules
//!
//! - `pages`: range parsing, page selection, per-page mutations, output assembly
//! - `pdf`: page tree editing on the `lopdf` object model
//! - `raster`: rendering, text and metadata via MuPDF
//! - `convert`: LibreOffice and wkhtmltopdf subprocesses
//! - `staging`: request-scoped upload and output files
//! - `routes`: the `/api` endpoints

pub mod config;
pub mod convert;
pub mod error;
pub mod pages;
pub mod pdf;
pub mod raster;
pub mod routes;
pub mod staging;
pub mod state;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// The complete HTTP application
pub fn app(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_bytes;

    routes::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

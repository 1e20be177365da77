//! PDF object model operations
//!
//! Page tree editing built on `lopdf`: loading (with optional password),
//! page extraction and reordering, merging, rotation, text overlays,
//! image pages and embedded image extraction. Rendering lives in
//! [`crate::raster`].

mod document;
mod error;
mod images;
mod overlay;

pub use document::{PdfDocument, PDF_CONTENT_TYPE};
pub use error::{PdfError, PdfResult};
pub use images::{extract_embedded_images, images_to_pdf, EmbeddedImage, Orientation};
pub use overlay::to_user_space;

#[cfg(test)]
pub(crate) use document::testing;

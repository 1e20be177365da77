//! Page range and page transformation pipeline
//!
//! Every page-targeting operation goes through the same four steps:
//!
//! 1. [`range`]: parse the caller's range text (`"1-3,5"`, `"all"`)
//! 2. [`selection`]: resolve it against the document's page count
//! 3. [`mutate`]: apply a per-page mutation to each selected page
//! 4. [`assemble`]: serialize the result as one document or an archive
//!
//! The document library is reached only through the [`PageSurface`] and
//! [`PageSource`] traits, so the pipeline can be exercised without PDFs.

pub mod assemble;
pub mod mutate;
pub mod range;
pub mod selection;

use thiserror::Error;

pub use assemble::{
    assemble, image_entry_name, page_entry_name, ArchiveWriter, Artifact, PageSource, Shape,
    ZIP_CONTENT_TYPE,
};
pub use mutate::{
    apply, Anchor, MutationSpec, NumberPosition, PageEdit, PageGeometry, PageSurface, Rgb,
    TextPlacement, TextStyle,
};
pub use range::{RangeSpec, RangeToken};
pub use selection::{resolve, resolve_single, Selection};

/// Errors raised while interpreting caller-supplied page parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PageError {
    /// A range token is not a positive integer or a `start-end` pair
    #[error("Invalid page range: '{0}'")]
    MalformedRange(String),

    /// A colour is not a 6-hex-digit string
    #[error("Invalid color: '{0}'")]
    InvalidColor(String),

    /// Page rotation that PDF cannot express
    #[error("Rotation must be a multiple of 90 degrees (got {0})")]
    InvalidRotation(i64),

    /// An explicit single-page target outside `[1, total]`
    #[error("Invalid page number")]
    OutOfRange { page: usize, total: usize },
}

//! Serialized MuPDF document access
//!
//! MuPDF documents are not thread-safe. [`SafeDocument`] keeps only the
//! path of the staged file, opens a fresh `mupdf::Document` for every
//! operation and serializes operations with a `parking_lot::Mutex`, so no
//! document handle outlives the closure that uses it.

use std::path::{Path, PathBuf};

use mupdf::Document;
use parking_lot::Mutex;

use crate::pdf::{PdfError, PdfResult};

/// Thread-safe handle to a PDF on disk
pub struct SafeDocument {
    path: PathBuf,
    page_count: usize,
    needs_password: bool,
    lock: Mutex<()>,
}

impl SafeDocument {
    /// Open and validate a PDF file
    pub fn open<P: AsRef<Path>>(path: P) -> PdfResult<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = open_document(&path)?;
        let page_count = doc.page_count().map_err(unreadable)? as usize;
        let needs_password = doc.needs_password().map_err(unreadable)?;

        Ok(Self {
            path,
            page_count,
            needs_password,
            lock: Mutex::new(()),
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Whether the document is encrypted with a non-empty user password
    pub fn needs_password(&self) -> bool {
        self.needs_password
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a freshly opened document
    ///
    /// Access is serialized; the document is dropped when `f` returns.
    pub fn with_doc<F, R>(&self, f: F) -> PdfResult<R>
    where
        F: FnOnce(&Document) -> PdfResult<R>,
    {
        let _guard = self.lock.lock();
        let doc = open_document(&self.path)?;
        f(&doc)
    }

    /// Fail with `PageNotFound` unless `index` is a page of this document
    pub fn check_page(&self, index: usize) -> PdfResult<()> {
        if index >= self.page_count {
            return Err(PdfError::PageNotFound(index, self.page_count));
        }
        Ok(())
    }
}

fn open_document(path: &Path) -> PdfResult<Document> {
    let path_str = path.to_string_lossy();
    Document::open(&*path_str).map_err(unreadable)
}

fn unreadable(err: mupdf::Error) -> PdfError {
    PdfError::Unreadable(err.to_string())
}

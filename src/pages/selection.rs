//! Page selector
//!
//! Resolves a [`RangeSpec`] against a concrete page count. Selection
//! contexts are tolerant: page numbers past the end of the document are
//! dropped. Explicit single-page targets use [`resolve_single`] instead and
//! fail when out of range.

use super::range::{RangeSpec, RangeToken};
use super::PageError;

/// Ordered 0-based page indices, all within `[0, total_pages)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    indices: Vec<usize>,
}

impl Selection {
    /// Every page of a document in ascending order
    pub fn all(total_pages: usize) -> Self {
        Self {
            indices: (0..total_pages).collect(),
        }
    }

    /// One page, as returned by [`resolve_single`]
    pub fn single(index: usize) -> Self {
        Self {
            indices: vec![index],
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// The selection as 1-based page numbers, for logs and responses
    pub fn page_numbers(&self) -> Vec<usize> {
        self.indices.iter().map(|i| i + 1).collect()
    }

    /// Distinct indices in ascending order
    pub fn distinct_sorted(&self) -> Vec<usize> {
        let mut indices = self.indices.clone();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.indices
    }
}

/// Resolve a range spec to page indices
///
/// Expansion follows token order, ascending inside a range token. A page
/// number named by `deletions` is skipped wherever it appears in `spec`.
pub fn resolve(spec: &RangeSpec, total_pages: usize, deletions: Option<&RangeSpec>) -> Selection {
    let deleted = |page: usize| deletions.is_some_and(|d| d.contains(page));

    let indices = match spec {
        RangeSpec::All => (1..=total_pages)
            .filter(|&page| !deleted(page))
            .map(|page| page - 1)
            .collect(),
        RangeSpec::Pages(tokens) => tokens
            .iter()
            .flat_map(|token| expand(token, total_pages))
            .filter(|&page| !deleted(page))
            .map(|page| page - 1)
            .collect(),
    };

    Selection { indices }
}

/// Resolve one explicit 1-based page target to its 0-based index
pub fn resolve_single(page: usize, total_pages: usize) -> Result<usize, PageError> {
    if page == 0 || page > total_pages {
        return Err(PageError::OutOfRange {
            page,
            total: total_pages,
        });
    }
    Ok(page - 1)
}

/// 1-based page numbers of a token that exist in the document
fn expand(token: &RangeToken, total_pages: usize) -> std::ops::RangeInclusive<usize> {
    // An empty range (start > end) when the token lies wholly past the end
    token.start()..=token.end().min(total_pages)
}

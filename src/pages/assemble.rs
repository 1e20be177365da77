//! Output assembler
//!
//! Turns a [`Selection`] over a [`PageSource`] into the bytes of the
//! response: either one document containing the selected pages or a ZIP
//! archive with one entry per page.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::selection::Selection;

pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Output layout of a page-targeting operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Selected pages in selection order, one document
    SingleDocument,
    /// One archive entry per selected page
    Archive,
}

/// Serialized operation result
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Something that can serialize a subset of its pages
pub trait PageSource {
    type Error: From<zip::result::ZipError> + From<std::io::Error>;

    /// MIME type of one serialized output
    fn content_type(&self) -> &'static str;

    /// File extension of one serialized output, without the dot
    fn extension(&self) -> &'static str;

    /// Serialize the pages at `indices`, in that order, as one output
    fn write_pages(&self, indices: &[usize]) -> Result<Vec<u8>, Self::Error>;
}

/// Assemble the selected pages into an artifact of the given shape
///
/// Archive entries are named after the 1-based page number, so a page
/// selected twice only appears once in an archive.
pub fn assemble<S: PageSource>(
    source: &S,
    selection: &Selection,
    shape: Shape,
) -> Result<Artifact, S::Error> {
    match shape {
        Shape::SingleDocument => Ok(Artifact {
            bytes: source.write_pages(selection.indices())?,
            content_type: source.content_type(),
        }),
        Shape::Archive => {
            let mut archive = ArchiveWriter::new();
            let mut seen = HashSet::new();

            for index in selection.iter().filter(|i| seen.insert(*i)) {
                let bytes = source.write_pages(&[index])?;
                archive.add_entry(&page_entry_name(index, source.extension()), &bytes)?;
            }

            tracing::debug!(entries = archive.len(), "Assembled page archive");

            Ok(Artifact {
                bytes: archive.finish()?,
                content_type: ZIP_CONTENT_TYPE,
            })
        }
    }
}

/// `page_{n}.{ext}` with a 1-based page number
pub fn page_entry_name(index: usize, extension: &str) -> String {
    format!("page_{}.{}", index + 1, extension)
}

/// `image_p{page}_{n}.{ext}`, both numbers 1-based
pub fn image_entry_name(page_index: usize, image_index: usize, extension: &str) -> String {
    format!("image_p{}_{}.{}", page_index + 1, image_index + 1, extension)
}

/// In-memory deflated ZIP archive
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            entries: 0,
        }
    }

    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), zip::result::ZipError> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn finish(self) -> Result<Vec<u8>, zip::result::ZipError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::{resolve, RangeSpec};
    use std::io::Read;
    use zip::ZipArchive;

    #[derive(Debug)]
    enum FakeError {
        Zip(zip::result::ZipError),
        Io(std::io::Error),
    }

    impl From<zip::result::ZipError> for FakeError {
        fn from(e: zip::result::ZipError) -> Self {
            FakeError::Zip(e)
        }
    }

    impl From<std::io::Error> for FakeError {
        fn from(e: std::io::Error) -> Self {
            FakeError::Io(e)
        }
    }

    /// Pages are single bytes; a "document" is their concatenation
    struct ByteBook {
        pages: Vec<u8>,
    }

    impl PageSource for ByteBook {
        type Error = FakeError;

        fn content_type(&self) -> &'static str {
            "application/octet-stream"
        }

        fn extension(&self) -> &'static str {
            "bin"
        }

        fn write_pages(&self, indices: &[usize]) -> Result<Vec<u8>, FakeError> {
            Ok(indices.iter().map(|&i| self.pages[i]).collect())
        }
    }

    fn read_archive(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_single_document_keeps_selection_order() {
        let book = ByteBook {
            pages: vec![10, 20, 30],
        };
        let selection = resolve(&RangeSpec::parse("3,1,1").unwrap(), 3, None);
        let artifact = assemble(&book, &selection, Shape::SingleDocument).unwrap();

        assert_eq!(artifact.bytes, vec![30, 10, 10]);
        assert_eq!(artifact.content_type, "application/octet-stream");
    }

    #[test]
    fn test_archive_has_one_entry_per_page() {
        let book = ByteBook {
            pages: vec![10, 20, 30],
        };
        let selection = resolve(&RangeSpec::parse("3,1").unwrap(), 3, None);
        let artifact = assemble(&book, &selection, Shape::Archive).unwrap();

        assert_eq!(artifact.content_type, ZIP_CONTENT_TYPE);
        assert_eq!(
            read_archive(artifact.bytes),
            vec![
                ("page_3.bin".to_string(), vec![30]),
                ("page_1.bin".to_string(), vec![10]),
            ]
        );
    }

    #[test]
    fn test_archive_skips_repeated_pages() {
        let book = ByteBook { pages: vec![1, 2] };
        let selection = resolve(&RangeSpec::parse("2,2,1").unwrap(), 2, None);
        let entries = read_archive(assemble(&book, &selection, Shape::Archive).unwrap().bytes);

        let names: Vec<_> = entries.into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["page_2.bin", "page_1.bin"]);
    }

    #[test]
    fn test_split_then_reassemble_keeps_page_count() {
        let book = ByteBook {
            pages: (0..7).collect(),
        };
        let archive = assemble(&book, &Selection::all(7), Shape::Archive).unwrap();
        let rejoined: Vec<u8> = read_archive(archive.bytes)
            .into_iter()
            .flat_map(|(_, data)| data)
            .collect();

        assert_eq!(rejoined, book.pages);
    }

    #[test]
    fn test_entry_names() {
        assert_eq!(page_entry_name(0, "pdf"), "page_1.pdf");
        assert_eq!(image_entry_name(2, 0, "jpg"), "image_p3_1.jpg");
    }

    #[test]
    fn test_empty_archive_is_valid_zip() {
        let writer = ArchiveWriter::new();
        assert!(writer.is_empty());
        let bytes = writer.finish().unwrap();
        assert!(read_archive(bytes).is_empty());
    }
}

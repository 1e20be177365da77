//! Page rasterization via MuPDF
//!
//! Renders pages to JPEG (full resolution or thumbnail), extracts page text
//! and reads document metadata. All methods block; callers run them on
//! `spawn_blocking`.

mod safe;

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use mupdf::{Colorspace, Matrix, MetadataName};
use serde::Serialize;

use crate::pages::PageSource;
use crate::pdf::{PdfError, PdfResult};

pub use safe::SafeDocument;

/// PDF user space unit is 1/72 inch
const POINTS_PER_INCH: f32 = 72.0;

/// JPEG quality of preview thumbnails
pub const THUMBNAIL_QUALITY: u8 = 85;

/// JPEG quality of full page renders
pub const PAGE_QUALITY: u8 = 90;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Encoded JPEG plus its pixel size
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    /// `data:image/jpeg;base64,...` form used by preview responses
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", JPEG_CONTENT_TYPE, BASE64.encode(&self.data))
    }
}

/// Document-level information reported by `pdf-info`
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub pages: usize,
    pub metadata: DocumentMetadata,
    pub is_encrypted: bool,
    pub page_sizes: Vec<PageSize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    #[serde(rename = "creationDate")]
    pub creation_date: Option<String>,
    #[serde(rename = "modDate")]
    pub mod_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// MuPDF renderer for one staged PDF
pub struct Rasterizer {
    doc: SafeDocument,
}

impl Rasterizer {
    pub fn open<P: AsRef<Path>>(path: P) -> PdfResult<Self> {
        Ok(Self {
            doc: SafeDocument::open(path)?,
        })
    }

    pub fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    /// Render one page at `dpi` dots per inch
    pub fn render_jpeg(&self, index: usize, dpi: u32, quality: u8) -> PdfResult<RenderedImage> {
        self.doc.check_page(index)?;
        let scale = dpi as f32 / POINTS_PER_INCH;

        self.doc.with_doc(|doc| {
            let page = doc.load_page(index as i32)?;
            let matrix = Matrix::new_scale(scale, scale);
            let pixmap = page.to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)?;
            encode_rendered(&pixmap_to_rgb(&pixmap)?, quality)
        })
    }

    /// Render one page scaled to `width` pixels wide
    pub fn thumbnail(&self, index: usize, width: u32) -> PdfResult<RenderedImage> {
        self.doc.check_page(index)?;

        self.doc.with_doc(|doc| {
            let page = doc.load_page(index as i32)?;
            let bounds = page.bounds()?;
            let page_width = (bounds.x1 - bounds.x0).max(1.0);
            let zoom = width.max(1) as f32 / page_width;

            let matrix = Matrix::new_scale(zoom, zoom);
            let pixmap = page.to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)?;
            encode_rendered(&pixmap_to_rgb(&pixmap)?, THUMBNAIL_QUALITY)
        })
    }

    /// Thumbnails of every page, in order
    pub fn thumbnails(&self, width: u32) -> PdfResult<Vec<RenderedImage>> {
        (0..self.page_count())
            .map(|index| self.thumbnail(index, width))
            .collect()
    }

    /// Plain text of one page, lines separated by `\n`
    pub fn page_text(&self, index: usize) -> PdfResult<String> {
        self.doc.check_page(index)?;
        self.doc.with_doc(|doc| {
            let page = doc.load_page(index as i32)?;
            Ok(page.to_text()?)
        })
    }

    pub fn info(&self) -> PdfResult<DocumentInfo> {
        let pages = self.page_count();
        let is_encrypted = self.doc.needs_password();

        self.doc.with_doc(|doc| {
            let get_meta = |name: MetadataName| -> Option<String> {
                doc.metadata(name).ok().filter(|s| !s.is_empty())
            };

            let metadata = DocumentMetadata {
                title: get_meta(MetadataName::Title),
                author: get_meta(MetadataName::Author),
                subject: get_meta(MetadataName::Subject),
                keywords: get_meta(MetadataName::Keywords),
                creator: get_meta(MetadataName::Creator),
                producer: get_meta(MetadataName::Producer),
                creation_date: get_meta(MetadataName::CreationDate),
                mod_date: get_meta(MetadataName::ModDate),
            };

            let mut page_sizes = Vec::with_capacity(pages);
            for index in 0..pages {
                let bounds = doc.load_page(index as i32)?.bounds()?;
                page_sizes.push(PageSize {
                    width: bounds.x1 - bounds.x0,
                    height: bounds.y1 - bounds.y0,
                });
            }

            Ok(DocumentInfo {
                pages,
                metadata,
                is_encrypted,
                page_sizes,
            })
        })
    }

    /// Pages as JPEG files, for archive assembly
    pub fn jpeg_pages(&self, dpi: u32) -> JpegPages<'_> {
        JpegPages {
            rasterizer: self,
            dpi,
        }
    }
}

/// [`PageSource`] producing one JPEG per page
pub struct JpegPages<'a> {
    rasterizer: &'a Rasterizer,
    dpi: u32,
}

impl PageSource for JpegPages<'_> {
    type Error = PdfError;

    fn content_type(&self) -> &'static str {
        JPEG_CONTENT_TYPE
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn write_pages(&self, indices: &[usize]) -> PdfResult<Vec<u8>> {
        match indices {
            [index] => Ok(self
                .rasterizer
                .render_jpeg(*index, self.dpi, PAGE_QUALITY)?
                .data),
            _ => Err(PdfError::Processing(
                "A JPEG holds exactly one page".to_string(),
            )),
        }
    }
}

/// Thumbnail of an image file, `width` pixels wide at most
///
/// Images narrower than `width` keep their size.
pub fn image_thumbnail(bytes: &[u8], width: u32) -> PdfResult<RenderedImage> {
    let img = image::load_from_memory(bytes).map_err(|e| PdfError::Unreadable(e.to_string()))?;

    let img = if width > 0 && width < img.width() {
        let height = ((img.height() as u64 * width as u64) / img.width() as u64).max(1) as u32;
        img.resize(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    encode_rendered(&img.to_rgb8(), THUMBNAIL_QUALITY)
}

/// Encode an RGB image as JPEG with the given quality (1-100)
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(output)
}

fn encode_rendered(image: &RgbImage, quality: u8) -> PdfResult<RenderedImage> {
    Ok(RenderedImage {
        data: encode_jpeg(image, quality)?,
        width: image.width(),
        height: image.height(),
    })
}

/// Copy pixmap samples into an RGB buffer, dropping any alpha channel
fn pixmap_to_rgb(pixmap: &mupdf::Pixmap) -> PdfResult<RgbImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgb_buffer = Vec::with_capacity((width * height * 3) as usize);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            if n >= 3 {
                let r = samples.get(offset).copied().unwrap_or(0);
                let g = samples.get(offset + 1).copied().unwrap_or(0);
                let b = samples.get(offset + 2).copied().unwrap_or(0);
                rgb_buffer.extend_from_slice(&[r, g, b]);
            } else {
                let v = samples.get(offset).copied().unwrap_or(0);
                rgb_buffer.extend_from_slice(&[v, v, v]);
            }
        }
    }

    RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| PdfError::Image("Failed to create image buffer".to_string()))
}

//! Image pages and embedded image extraction

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};

use crate::raster::encode_jpeg;

use super::document::{inherited, number, resolve, PdfDocument};
use super::error::{PdfError, PdfResult};

/// JPEG quality of image XObjects and extracted images
const JPEG_QUALITY: u8 = 90;

const A4_PORTRAIT: (f32, f32) = (595.0, 842.0);

/// Page orientation for image documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// `landscape` (any case) selects landscape; anything else is portrait
    pub fn from_token(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("landscape") {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// A4 page size in points
    pub fn page_size(self) -> (f32, f32) {
        match self {
            Orientation::Portrait => A4_PORTRAIT,
            Orientation::Landscape => (A4_PORTRAIT.1, A4_PORTRAIT.0),
        }
    }
}

/// One image found in a page's resources, re-encoded as JPEG
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub page_index: usize,
    /// Position among the images extracted from the same page
    pub image_index: usize,
    pub data: Vec<u8>,
}

/// Build a document with one A4 page per image
///
/// Each image is shrunk (never enlarged) to fit inside `margin` points of
/// the page edges, then centred. One image pixel is one point.
pub fn images_to_pdf(
    images: &[Vec<u8>],
    orientation: Orientation,
    margin: f32,
) -> PdfResult<PdfDocument> {
    if images.is_empty() {
        return Err(PdfError::Unreadable("No valid images provided".to_string()));
    }

    let (page_width, page_height) = orientation.page_size();
    let margin = margin.max(0.0);
    let max_width = (page_width - 2.0 * margin).max(1.0);
    let max_height = (page_height - 2.0 * margin).max(1.0);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for (i, bytes) in images.iter().enumerate() {
        let rgb = image::load_from_memory(bytes)
            .map_err(|e| PdfError::Unreadable(format!("image {}: {}", i + 1, e)))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();

        let image_id = doc.add_object(Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(i64::from(width))),
                ("Height", Object::Integer(i64::from(height))),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::Name(b"DCTDecode".to_vec())),
            ]),
            encode_jpeg(&rgb, JPEG_QUALITY)?,
        ));

        let scale = (max_width / width as f32)
            .min(max_height / height as f32)
            .min(1.0);
        let (draw_width, draw_height) = (width as f32 * scale, height as f32 * scale);
        let x = (page_width - draw_width) / 2.0;
        let y = (page_height - draw_height) / 2.0;

        let content = format!(
            "q\n{} 0 0 {} {} {} cm\n/Im0 Do\nQ\n",
            draw_width, draw_height, x, y
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let resources = Dictionary::from_iter(vec![(
            "XObject",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "Im0",
                Object::Reference(image_id),
            )])),
        )]);
        kids.push(doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    0.into(),
                    0.into(),
                    page_width.into(),
                    page_height.into(),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ])));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(kids.len() as i64)),
            (
                "Kids",
                Object::Array(kids.iter().map(|&id| Object::Reference(id)).collect()),
            ),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    tracing::debug!(pages = kids.len(), ?orientation, "Built image document");

    Ok(PdfDocument::from_lopdf(doc))
}

/// Every decodable image XObject, page by page, as JPEG
///
/// Images in encodings that cannot be decoded here (JBIG2, JPX, CCITT,
/// indexed or CMYK raw samples) are skipped.
pub fn extract_embedded_images(doc: &PdfDocument) -> PdfResult<Vec<EmbeddedImage>> {
    let mut extracted = Vec::new();

    for (page_index, &page_id) in doc.page_ids.iter().enumerate() {
        let Some(resources) = inherited(&doc.inner, page_id, b"Resources") else {
            continue;
        };
        let Ok(resources) = resolve(&doc.inner, &resources).as_dict() else {
            continue;
        };
        let Ok(xobjects) = resources
            .get(b"XObject")
            .and_then(|x| resolve(&doc.inner, x).as_dict())
        else {
            continue;
        };

        let mut image_index = 0;
        for (name, object) in xobjects.iter() {
            let Ok(stream) = resolve(&doc.inner, object).as_stream() else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(|s| s.as_name())
                .map(|s| s == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }

            match decode_image(&doc.inner, stream) {
                Some(decoded) => {
                    extracted.push(EmbeddedImage {
                        page_index,
                        image_index,
                        data: encode_jpeg(&decoded.to_rgb8(), JPEG_QUALITY)?,
                    });
                    image_index += 1;
                }
                None => tracing::debug!(
                    page = page_index + 1,
                    name = %String::from_utf8_lossy(name),
                    "Skipping undecodable image"
                ),
            }
        }
    }

    Ok(extracted)
}

fn stream_filters(doc: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").map(|f| resolve(doc, f)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> Option<DynamicImage> {
    let filters = stream_filters(doc, stream);

    if filters.iter().any(|f| f.as_slice() == b"DCTDecode") {
        if filters.len() != 1 {
            return None;
        }
        return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
    }

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().ok()?
    };

    let dimension = |key: &[u8]| -> Option<u32> {
        let value = number(resolve(doc, stream.dict.get(key).ok()?))?;
        (value >= 1.0).then_some(value as u32)
    };
    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;
    if dimension(b"BitsPerComponent")? != 8 {
        return None;
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .map(|c| resolve(doc, c))
        .ok()
        .and_then(|c| c.as_name().ok())?;
    let pixels = width as usize * height as usize;

    match color_space {
        b"DeviceRGB" => {
            let data = samples.get(..pixels * 3)?.to_vec();
            RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" => {
            let data = samples.get(..pixels)?.to_vec();
            GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_orientation_tokens() {
        assert_eq!(Orientation::from_token("Landscape"), Orientation::Landscape);
        assert_eq!(Orientation::from_token("sideways"), Orientation::Portrait);
        assert_eq!(Orientation::Landscape.page_size(), (842.0, 595.0));
    }

    #[test]
    fn test_one_a4_page_per_image() {
        let images = vec![png(40, 30), png(10, 10), png(5, 50)];
        let doc = images_to_pdf(&images, Orientation::Landscape, 20.0).unwrap();

        assert_eq!(doc.page_count(), 3);
        for i in 0..3 {
            let geometry = doc.geometry(i).unwrap();
            assert_eq!((geometry.width, geometry.height), (842.0, 595.0));
        }
    }

    #[test]
    fn test_large_image_is_shrunk_into_margins() {
        let mut doc = images_to_pdf(&[png(1190, 100)], Orientation::Portrait, 20.0).unwrap();
        let content = doc.inner.get_page_content(doc.page_ids[0]).unwrap();
        let content = String::from_utf8(content).unwrap();

        // 1190 px scaled into the 555 pt wide box, centred horizontally
        let matrix: Vec<f32> = content
            .lines()
            .find(|line| line.ends_with(" cm"))
            .unwrap()
            .split_whitespace()
            .take(6)
            .map(|n| n.parse().unwrap())
            .collect();
        assert!((matrix[0] - 555.0).abs() < 0.01);
        assert!((matrix[3] - 100.0 * 555.0 / 1190.0).abs() < 0.01);
        assert!((matrix[4] - 20.0).abs() < 0.01);
        assert!(doc.to_bytes().is_ok());
    }

    #[test]
    fn test_non_image_input_is_unreadable() {
        let result = images_to_pdf(&[b"not an image".to_vec()], Orientation::Portrait, 20.0);
        assert!(matches!(result, Err(PdfError::Unreadable(_))));
    }

    #[test]
    fn test_extracts_jpeg_xobjects() {
        let images = vec![png(12, 8), png(6, 6)];
        let doc = images_to_pdf(&images, Orientation::Portrait, 20.0).unwrap();
        let extracted = extract_embedded_images(&doc).unwrap();

        assert_eq!(extracted.len(), 2);
        assert_eq!((extracted[1].page_index, extracted[1].image_index), (1, 0));
        let decoded = image::load_from_memory(&extracted[0].data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 8));
    }

    #[test]
    fn test_extracts_raw_gray_samples() {
        let mut doc = images_to_pdf(&[png(4, 4)], Orientation::Portrait, 0.0).unwrap();
        let raw = Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(3)),
                ("Height", Object::Integer(2)),
                ("ColorSpace", Object::Name(b"DeviceGray".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
            ]),
            vec![0, 50, 100, 150, 200, 250],
        );
        let raw_id = doc.inner.add_object(raw);

        let page = doc.inner.get_dictionary_mut(doc.page_ids[0]).unwrap();
        let resources = page.get_mut(b"Resources").unwrap().as_dict_mut().unwrap();
        let xobjects = resources.get_mut(b"XObject").unwrap().as_dict_mut().unwrap();
        xobjects.set("Im1", Object::Reference(raw_id));

        let extracted = extract_embedded_images(&doc).unwrap();
        assert_eq!(extracted.len(), 2);
        let decoded = image::load_from_memory(&extracted[1].data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }
}

//! Text overlays
//!
//! Text is drawn with the standard Helvetica font in its own content stream
//! appended after the existing page content. The existing content is wrapped
//! in `q`/`Q` first, so whatever graphics state it leaves behind cannot leak
//! into the overlay.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::pages::TextPlacement;

use super::document::{inherited, resolve, PdfDocument};
use super::error::PdfResult;

/// Resource name of the overlay font, chosen not to clash with page fonts
const FONT_RESOURCE: &str = "PwHelv";

impl PdfDocument {
    /// Draw `placement` on top of the page at `index`
    pub(super) fn overlay_text(&mut self, index: usize, placement: &TextPlacement) -> PdfResult<()> {
        let page_id = self.page_id(index)?;
        let page_box = self.page_box(page_id);
        let rotation = self.rotation(page_id);
        let (u, v) = to_user_space(page_box, rotation, placement.x, placement.y);

        let font_id = self.overlay_font();
        let opacity = placement.style.opacity;
        let graphics_state = (opacity < 1.0).then(|| {
            let name = format!("PwGs{}", (opacity * 100.0).round() as u32);
            let id = self.inner.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"ExtGState".to_vec())),
                ("ca", opacity.into()),
                ("CA", opacity.into()),
            ]));
            (name, id)
        });

        let mut resources = page_resources(&self.inner, page_id);
        let mut fonts = sub_dictionary(&self.inner, &resources, b"Font");
        fonts.set(FONT_RESOURCE, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));
        if let Some((name, id)) = &graphics_state {
            let mut states = sub_dictionary(&self.inner, &resources, b"ExtGState");
            states.set(name.as_str(), Object::Reference(*id));
            resources.set("ExtGState", Object::Dictionary(states));
        }

        let operations = text_operations(
            placement,
            (u, v),
            rotation as f32 + placement.angle,
            graphics_state.as_ref().map(|(name, _)| name.as_str()),
        );
        let mut overlay = b"Q\n".to_vec();
        overlay.extend(Content { operations }.encode()?);

        let save_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let overlay_id = self.inner.add_object(Stream::new(Dictionary::new(), overlay));

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(existing_contents(&self.inner, page_id));
        contents.push(Object::Reference(overlay_id));

        let page = self.inner.get_dictionary_mut(page_id)?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));

        Ok(())
    }

    fn overlay_font(&mut self) -> ObjectId {
        if let Some(id) = self.overlay_font {
            return id;
        }
        let id = self.inner.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        self.overlay_font = Some(id);
        id
    }
}

/// Map a point on the displayed page (top-left origin, y down) to PDF user
/// space for a page with box `[x0, y0, x1, y1]` and clockwise `/Rotate`
pub fn to_user_space(page_box: [f32; 4], rotation: i64, x: f32, y: f32) -> (f32, f32) {
    let [x0, y0, x1, y1] = page_box;
    let (w, h) = (x1 - x0, y1 - y0);
    match rotation.rem_euclid(360) {
        90 => (x0 + y, y0 + x),
        180 => (x0 + w - x, y0 + y),
        270 => (x0 + w - y, y0 + h - x),
        _ => (x0 + x, y0 + h - y),
    }
}

fn text_operations(
    placement: &TextPlacement,
    origin: (f32, f32),
    angle_degrees: f32,
    graphics_state: Option<&str>,
) -> Vec<Operation> {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let color = placement.style.color;

    let mut operations = vec![Operation::new("q", vec![])];
    if let Some(name) = graphics_state {
        operations.push(Operation::new(
            "gs",
            vec![Object::Name(name.as_bytes().to_vec())],
        ));
    }
    operations.extend([
        Operation::new("rg", vec![color.r.into(), color.g.into(), color.b.into()]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                placement.style.font_size.into(),
            ],
        ),
        Operation::new(
            "Tm",
            vec![
                cos.into(),
                sin.into(),
                (-sin).into(),
                cos.into(),
                origin.0.into(),
                origin.1.into(),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&placement.text),
                StringFormat::Literal,
            )],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]);
    operations
}

/// WinAnsi bytes for `text`; characters outside Latin-1 become `?`
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// The page's resources as an owned, inline dictionary
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, &obj).as_dict().ok().cloned())
        .unwrap_or_default()
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_default()
}

/// Existing content stream references, flattened
fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Some(contents) = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok())
    else {
        return Vec::new();
    };

    match contents {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![contents.clone()],
        },
        _ => Vec::new(),
    }
}

//! lopdf-backed document

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use mupdf::pdf::{Encryption, PdfDocument as MuPdfDocument, PdfWriteOptions};

use crate::pages::{PageGeometry, PageSource, PageSurface, TextPlacement};

use super::error::{PdfError, PdfResult};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guards against cyclic `/Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 32;

/// An opened PDF with its pages in document order
pub struct PdfDocument {
    pub(super) inner: Document,
    pub(super) page_ids: Vec<ObjectId>,
    /// Helvetica font object shared by all text overlays
    pub(super) overlay_font: Option<ObjectId>,
}

impl PdfDocument {
    /// Open an unencrypted (or empty-password) PDF from disk
    pub fn load(path: &Path) -> PdfResult<Self> {
        Self::load_with_password(path, "")
    }

    /// Open a PDF from disk, decrypting it with `password` when needed
    pub fn load_with_password(path: &Path, password: &str) -> PdfResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes_with_password(&data, password)
    }

    pub fn from_bytes(data: &[u8]) -> PdfResult<Self> {
        Self::from_bytes_with_password(data, "")
    }

    /// Parse a PDF from memory
    ///
    /// Encrypted documents are decrypted and lose their `/Encrypt` entry, so
    /// whatever is saved afterwards is unprotected. Documents with only an
    /// owner password open with any `password`.
    pub fn from_bytes_with_password(data: &[u8], password: &str) -> PdfResult<Self> {
        let mut inner = load_lopdf(data)?;
        if !inner.is_encrypted() {
            return Ok(Self::from_lopdf(inner));
        }

        // lopdf decrypts on load when the empty user password works
        if inner.encryption_state.is_some() {
            strip_encryption(&mut inner);
            return Ok(Self::from_lopdf(inner));
        }

        let plain = decrypt_with_password(data, password)?;
        let mut inner = load_lopdf(&plain)?;
        strip_encryption(&mut inner);
        Ok(Self::from_lopdf(inner))
    }

    pub(super) fn from_lopdf(inner: Document) -> Self {
        let page_ids = inner.get_pages().into_values().collect();
        Self {
            inner,
            page_ids,
            overlay_font: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub(super) fn page_id(&self, index: usize) -> PdfResult<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageNotFound(index, self.page_ids.len()))
    }

    /// Displayed size and rotation of the page at `index`
    pub fn geometry(&self, index: usize) -> PdfResult<PageGeometry> {
        let page_id = self.page_id(index)?;
        let [x0, y0, x1, y1] = self.page_box(page_id);
        let rotation = self.rotation(page_id);
        let (width, height) = (x1 - x0, y1 - y0);

        Ok(if rotation % 180 == 0 {
            PageGeometry {
                width,
                height,
                rotation,
            }
        } else {
            PageGeometry {
                width: height,
                height: width,
                rotation,
            }
        })
    }

    /// Set the absolute `/Rotate` value of a page
    pub fn set_rotation(&mut self, index: usize, degrees: i64) -> PdfResult<()> {
        let page_id = self.page_id(index)?;
        self.inner
            .get_dictionary_mut(page_id)?
            .set("Rotate", Object::Integer(degrees.rem_euclid(360)));
        Ok(())
    }

    /// New document holding the pages at `indices`, in that order
    ///
    /// A page listed more than once is copied, so the result has exactly
    /// `indices.len()` pages. Outlines are dropped since their destinations
    /// may point at pages that no longer exist.
    pub fn extract(&self, indices: &[usize]) -> PdfResult<PdfDocument> {
        let mut doc = self.inner.clone();
        let mut kids = Vec::with_capacity(indices.len());
        let mut used = HashSet::new();

        for &index in indices {
            let page_id = self.page_id(index)?;
            materialize_inherited(&mut doc, page_id)?;

            if used.insert(page_id) {
                kids.push(page_id);
            } else {
                let copy = doc.get_dictionary(page_id)?.clone();
                kids.push(doc.add_object(copy));
            }
        }

        install_page_tree(&mut doc, &kids)?;
        doc.prune_objects();

        Ok(PdfDocument::from_lopdf(doc))
    }

    /// Concatenate documents in order into one
    pub fn merge(documents: Vec<PdfDocument>) -> PdfResult<PdfDocument> {
        if documents.is_empty() {
            return Err(PdfError::Processing("No documents to merge".to_string()));
        }

        let mut max_id = 1;
        let mut kids = Vec::new();
        let mut objects = BTreeMap::new();

        for source in documents {
            let mut doc = source.inner;
            for &page_id in &source.page_ids {
                materialize_inherited(&mut doc, page_id)?;
            }

            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            kids.extend(doc.get_pages().into_values());
            objects.extend(doc.objects);
        }

        let mut merged = Document::with_version("1.5");
        merged.objects.extend(objects);
        // Keep new ids clear of everything just copied in
        merged.max_id = max_id - 1;

        install_page_tree(&mut merged, &kids)?;
        merged.prune_objects();

        tracing::debug!(pages = kids.len(), "Merged documents");

        Ok(PdfDocument::from_lopdf(merged))
    }

    /// Serialize the document
    pub fn to_bytes(&mut self) -> PdfResult<Vec<u8>> {
        self.inner.compress();
        let mut output = Vec::new();
        self.inner.save_to(&mut output)?;
        Ok(output)
    }

    /// Effective page box (CropBox, else MediaBox) as `[x0, y0, x1, y1]`
    pub(super) fn page_box(&self, page_id: ObjectId) -> [f32; 4] {
        inherited(&self.inner, page_id, b"CropBox")
            .and_then(|obj| parse_rect(&self.inner, &obj))
            .or_else(|| {
                inherited(&self.inner, page_id, b"MediaBox")
                    .and_then(|obj| parse_rect(&self.inner, &obj))
            })
            .unwrap_or(DEFAULT_MEDIA_BOX)
    }

    /// Page rotation normalized to `[0, 360)`
    pub(super) fn rotation(&self, page_id: ObjectId) -> i64 {
        inherited(&self.inner, page_id, b"Rotate")
            .and_then(|obj| resolve(&self.inner, &obj).as_i64().ok())
            .map(|r| r.rem_euclid(360))
            .unwrap_or(0)
    }
}

impl PageSurface for PdfDocument {
    type Error = PdfError;

    fn page_count(&self) -> usize {
        PdfDocument::page_count(self)
    }

    fn geometry(&self, index: usize) -> PdfResult<PageGeometry> {
        PdfDocument::geometry(self, index)
    }

    fn set_rotation(&mut self, index: usize, degrees: i64) -> PdfResult<()> {
        PdfDocument::set_rotation(self, index, degrees)
    }

    fn draw_text(&mut self, index: usize, placement: &TextPlacement) -> PdfResult<()> {
        self.overlay_text(index, placement)
    }
}

impl PageSource for PdfDocument {
    type Error = PdfError;

    fn content_type(&self) -> &'static str {
        PDF_CONTENT_TYPE
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn write_pages(&self, indices: &[usize]) -> PdfResult<Vec<u8>> {
        self.extract(indices)?.to_bytes()
    }
}

/// Follow one level of indirection
pub(super) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a page attribute on the page or its nearest ancestor
pub(super) fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        node_id = node.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
    }
    None
}

/// Copy inherited attributes onto the page itself, so it can be re-parented
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> PdfResult<()> {
    let missing: Vec<(&[u8], Object)> = {
        let page = doc.get_dictionary(page_id)?;
        INHERITABLE_KEYS
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| inherited(doc, page_id, key).map(|value| (*key, value)))
            .collect()
    };

    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in missing {
        page.set(key.to_vec(), value);
    }
    Ok(())
}

/// Point the catalog at a fresh root `Pages` node holding `kids`
fn install_page_tree(doc: &mut Document, kids: &[ObjectId]) -> PdfResult<()> {
    let pages_id = doc.new_object_id();

    for &kid in kids {
        doc.get_dictionary_mut(kid)?
            .set("Parent", Object::Reference(pages_id));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(kids.len() as i64)),
        (
            "Kids",
            Object::Array(kids.iter().map(|&id| Object::Reference(id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let root_id = doc.trailer.get(b"Root").and_then(|r| r.as_reference());
    match root_id {
        Ok(catalog_id) if doc.get_dictionary(catalog_id).is_ok() => {
            let catalog = doc.get_dictionary_mut(catalog_id)?;
            catalog.set("Pages", Object::Reference(pages_id));
            catalog.remove(b"Outlines");
        }
        _ => {
            let catalog = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Catalog".to_vec())),
                ("Pages", Object::Reference(pages_id)),
            ]);
            let catalog_id = doc.add_object(catalog);
            doc.trailer.set("Root", Object::Reference(catalog_id));
        }
    }

    Ok(())
}

fn load_lopdf(data: &[u8]) -> PdfResult<Document> {
    Document::load_mem(data).map_err(|e| PdfError::Unreadable(e.to_string()))
}

/// Drop `/Encrypt` from a document whose objects are already plaintext
fn strip_encryption(doc: &mut Document) {
    if let Some(Ok(encrypt_id)) = doc.trailer.remove(b"Encrypt").map(|o| o.as_reference()) {
        doc.objects.remove(&encrypt_id);
    }
    doc.encryption_state = None;
}

/// Re-serialize a user-password protected PDF without encryption
///
/// lopdf only reads such files with the empty password, so MuPDF
/// authenticates and writes the plaintext copy.
fn decrypt_with_password(data: &[u8], password: &str) -> PdfResult<Vec<u8>> {
    let mut doc =
        MuPdfDocument::from_bytes(data).map_err(|e| PdfError::Unreadable(e.to_string()))?;

    if doc.needs_password()? && !doc.authenticate(password)? {
        tracing::debug!("PDF password rejected");
        return Err(PdfError::Password);
    }

    let mut options = PdfWriteOptions::default();
    options.set_encryption(Encryption::None);
    let mut plain = Vec::with_capacity(data.len());
    doc.write_to_with_options(&mut plain, options)?;
    Ok(plain)
}

pub(super) fn number(obj: &Object) -> Option<f32> {
    match *obj {
        Object::Integer(i) => Some(i as f32),
        Object::Real(r) => Some(r as f32),
        _ => None,
    }
}

fn parse_rect(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let values = match resolve(doc, obj) {
        Object::Array(items) if items.len() == 4 => items
            .iter()
            .map(|item| number(resolve(doc, item)))
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };

    let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));
    if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
        return None;
    }
    Some([x0, y0, x1, y1])
}


#[cfg(test)]
mod tests {
    use super::testing::{encrypted_pdf, page_width, sample_pdf, sample_pdf_inherited};
    use super::*;
    use crate::pages::{apply, assemble, resolve as resolve_range, MutationSpec, RangeSpec, Selection, Shape};

    fn widths(doc: &PdfDocument) -> Vec<f32> {
        (0..doc.page_count())
            .map(|i| doc.geometry(i).unwrap().width)
            .collect()
    }

    fn reload(doc: &mut PdfDocument) -> PdfDocument {
        PdfDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_load_reports_pages_and_geometry() {
        let doc = PdfDocument::from_bytes(&sample_pdf(3)).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(
            doc.geometry(1).unwrap(),
            PageGeometry {
                width: page_width(1),
                height: 200.0,
                rotation: 0
            }
        );
        assert!(matches!(doc.geometry(3), Err(PdfError::PageNotFound(3, 3))));
    }

    fn page_text(doc: &PdfDocument, index: usize) -> String {
        let content = doc.inner.get_page_content(doc.page_ids[index]).unwrap();
        String::from_utf8_lossy(&content).into_owned()
    }

    #[test]
    fn test_user_password_unlocks_every_page() {
        let data = encrypted_pdf(3, "secret", "owner");
        let doc = PdfDocument::from_bytes_with_password(&data, "secret").unwrap();

        assert_eq!(doc.page_count(), 3);
        assert!(!doc.inner.is_encrypted());
        assert!(page_text(&doc, 0).contains("Page 1"));
        assert!(page_text(&doc, 2).contains("Page 3"));
        assert_eq!(widths(&doc), vec![page_width(0), page_width(1), page_width(2)]);
    }

    #[test]
    fn test_wrong_or_missing_password_is_rejected() {
        let data = encrypted_pdf(2, "secret", "owner");
        assert!(matches!(
            PdfDocument::from_bytes_with_password(&data, "nope"),
            Err(PdfError::Password)
        ));
        assert!(matches!(PdfDocument::from_bytes(&data), Err(PdfError::Password)));
    }

    #[test]
    fn test_owner_only_protection_opens_without_password() {
        let data = encrypted_pdf(2, "", "owner");
        let mut doc = PdfDocument::from_bytes(&data).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert!(page_text(&doc, 1).contains("Page 2"));

        // Saved output is plaintext and readable again
        let reloaded = reload(&mut doc);
        assert!(!reloaded.inner.is_encrypted());
        assert!(page_text(&reloaded, 0).contains("Page 1"));
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let result = PdfDocument::from_bytes(b"definitely not a pdf");
        assert!(matches!(result, Err(PdfError::Unreadable(_))));
    }

    #[test]
    fn test_extract_reorders_and_repeats() {
        let doc = PdfDocument::from_bytes(&sample_pdf(4)).unwrap();
        let mut extracted = doc.extract(&[3, 0, 0]).unwrap();
        let reloaded = reload(&mut extracted);

        assert_eq!(
            widths(&reloaded),
            vec![page_width(3), page_width(0), page_width(0)]
        );
    }

    #[test]
    fn test_extract_keeps_inherited_attributes() {
        let doc = PdfDocument::from_bytes(&sample_pdf_inherited(2, 90)).unwrap();
        let mut extracted = doc.extract(&[1]).unwrap();
        let reloaded = reload(&mut extracted);

        let geometry = reloaded.geometry(0).unwrap();
        assert_eq!(geometry.rotation, 90);
        assert_eq!((geometry.width, geometry.height), (400.0, 300.0));
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let first = PdfDocument::from_bytes(&sample_pdf(2)).unwrap();
        let second = PdfDocument::from_bytes(&sample_pdf_inherited(3, 0)).unwrap();
        let mut merged = PdfDocument::merge(vec![first, second]).unwrap();
        let reloaded = reload(&mut merged);

        assert_eq!(
            widths(&reloaded),
            vec![page_width(0), page_width(1), 300.0, 300.0, 300.0]
        );
    }

    #[test]
    fn test_merge_nothing_fails() {
        assert!(PdfDocument::merge(Vec::new()).is_err());
    }

    #[test]
    fn test_rotation_survives_save() {
        let mut doc = PdfDocument::from_bytes(&sample_pdf(3)).unwrap();
        let selection = resolve_range(&RangeSpec::parse("2-3").unwrap(), 3, None);
        apply(&mut doc, &selection, &MutationSpec::rotate(270).unwrap()).unwrap();

        let reloaded = reload(&mut doc);
        let rotations: Vec<_> = (0..3)
            .map(|i| reloaded.geometry(i).unwrap().rotation)
            .collect();
        assert_eq!(rotations, vec![0, 270, 270]);
        assert_eq!(reloaded.geometry(1).unwrap().height, page_width(1));
    }

    #[test]
    fn test_split_then_merge_restores_page_count() {
        let doc = PdfDocument::from_bytes(&sample_pdf(5)).unwrap();
        let parts: Vec<PdfDocument> = (0..5)
            .map(|i| PdfDocument::from_bytes(&doc.write_pages(&[i]).unwrap()).unwrap())
            .collect();
        assert!(parts.iter().all(|p| p.page_count() == 1));

        let merged = PdfDocument::merge(parts).unwrap();
        assert_eq!(merged.page_count(), 5);
        assert_eq!(widths(&merged), widths(&doc));
    }

    #[test]
    fn test_single_document_assembly_follows_selection() {
        let doc = PdfDocument::from_bytes(&sample_pdf(3)).unwrap();
        let selection = resolve_range(&RangeSpec::parse("3,1").unwrap(), 3, None);
        let artifact = assemble(&doc, &selection, Shape::SingleDocument).unwrap();

        assert_eq!(artifact.content_type, PDF_CONTENT_TYPE);
        let out = PdfDocument::from_bytes(&artifact.bytes).unwrap();
        assert_eq!(widths(&out), vec![page_width(2), page_width(0)]);
    }

    #[test]
    fn test_extract_all_is_identity_on_order() {
        let doc = PdfDocument::from_bytes(&sample_pdf(4)).unwrap();
        let all = Selection::all(4);
        let out = doc.extract(all.indices()).unwrap();
        assert_eq!(widths(&out), widths(&doc));
    }
}

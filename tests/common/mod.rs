//! Shared helpers for the HTTP tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use lopdf::content::{Content, Operation};
use lopdf::{
    Dictionary, Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream,
};
use parking_lot::Mutex;
use tempfile::TempDir;

use pagewright_server::config::{Config, StagingConfig};
use pagewright_server::convert::{ConvertError, DocumentConverter, TargetFormat, UrlRenderer};
use pagewright_server::{app, AppState};

pub const BOUNDARY: &str = "pagewright-test-boundary";

/// A running app over throwaway staging directories
pub struct TestApp {
    pub router: Router,
    pub renderer: Arc<FakeRenderer>,
    pub converter: Arc<FakeConverter>,
    dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.staging = StagingConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
        };
        config.converters.timeout = Duration::from_secs(5);

        let converter = Arc::new(FakeConverter::default());
        let renderer = Arc::new(FakeRenderer::default());
        let state = AppState::with_converters(config, converter.clone(), renderer.clone());
        state.staging().ensure_dirs().await.unwrap();

        Self {
            router: app(state),
            renderer,
            converter,
            dir,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    /// Files left behind in either staging directory
    pub fn leftovers(&self) -> Vec<PathBuf> {
        [self.upload_dir(), self.output_dir()]
            .iter()
            .flat_map(|dir| std::fs::read_dir(dir).unwrap())
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// Converter that writes a marker file named like LibreOffice would
#[derive(Default)]
pub struct FakeConverter {
    pub calls: Mutex<Vec<(PathBuf, TargetFormat)>>,
    pub fail: Mutex<Option<ConvertError>>,
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(
        &self,
        input: &Path,
        format: TargetFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        self.calls.lock().push((input.to_path_buf(), format));
        if let Some(err) = self.fail.lock().take() {
            return Err(err);
        }

        let stem = input.file_stem().unwrap().to_string_lossy();
        let output = out_dir.join(format!("{}.{}", stem, format.extension()));
        let source = std::fs::read(input)?;
        std::fs::write(&output, [b"converted:".as_slice(), source.as_slice()].concat())?;
        Ok(output)
    }
}

/// Renderer that writes a one page PDF and records the URL
#[derive(Default)]
pub struct FakeRenderer {
    pub urls: Mutex<Vec<String>>,
}

#[async_trait]
impl UrlRenderer for FakeRenderer {
    async fn render(&self, url: &str, output: &Path) -> Result<(), ConvertError> {
        self.urls.lock().push(url.to_string());
        std::fs::write(output, sample_pdf(1))?;
        Ok(())
    }
}

/// PDF whose page `i` is `100 + 10 * i` points wide and reads "Page i+1"
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));

    let mut kids = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
                Operation::new("Td", vec![20.into(), 20.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    0.into(),
                    0.into(),
                    Object::Real(page_width(i)),
                    200.into(),
                ]),
            ),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter(vec![(
                    "Font",
                    Object::Dictionary(Dictionary::from_iter(vec![(
                        "F1",
                        Object::Reference(font_id),
                    )])),
                )])),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(pages as i64)),
            ("Kids", Object::Array(kids)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// [`sample_pdf`] encrypted with RC4-128; an empty `user_password` gives
/// an owner-only protected file
pub fn encrypted_pdf(pages: usize, user_password: &str, owner_password: &str) -> Vec<u8> {
    let mut doc = Document::load_mem(&sample_pdf(pages)).unwrap();
    let file_id = Object::string_literal(b"pagewright-test-1".to_vec());
    doc.trailer
        .set("ID", Object::Array(vec![file_id.clone(), file_id]));

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password,
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    })
    .unwrap();
    doc.encrypt(&state).unwrap();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Decoded content stream of every page in a returned PDF
pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
        .collect()
}

pub fn page_width(index: usize) -> f32 {
    100.0 + 10.0 * index as f32
}

/// Widths of each page in a returned PDF, in page order
pub fn page_widths(pdf: &[u8]) -> Vec<f32> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            match media_box[2] {
                Object::Integer(i) => i as f32,
                Object::Real(r) => r,
                _ => panic!("unexpected MediaBox entry"),
            }
        })
        .collect()
}

enum Part {
    Text(String, String),
    File(String, String, Vec<u8>),
}

/// `multipart/form-data` request body
#[derive(Default)]
pub struct Form {
    parts: Vec<Part>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text(name.to_string(), value.to_string()));
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: Vec<u8>) -> Self {
        self.parts
            .push(Part::File(name.to_string(), file_name.to_string(), data));
        self
    }

    pub fn into_request(self, uri: &str) -> Request<Body> {
        let mut body = Vec::new();
        for part in self.parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }
}

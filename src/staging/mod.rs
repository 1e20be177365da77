//! Request-scoped staged files
//!
//! Every request stages its upload under a unique name in the upload
//! directory and writes its artifact under a unique name in the output
//! directory. A [`StagedFile`] deletes its file exactly once, either when
//! [`StagedFile::release`] is called or when it is dropped. Downloads hand
//! the output file to the response body via [`attachment`], so it is
//! released after the last byte is sent or when the client goes away.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::config::StagingConfig;

/// Read size for streamed downloads
const CHUNK_SIZE: usize = 64 * 1024;

/// Whether a staged file came in with the request or goes out with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

/// An uploaded file as read from the multipart form
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Lowercased extension of the original file name
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// The upload and output directories
#[derive(Clone)]
pub struct StagingArea {
    inner: Arc<StagingAreaInner>,
}

struct StagingAreaInner {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl StagingArea {
    pub fn new(config: &StagingConfig) -> Self {
        Self {
            inner: Arc::new(StagingAreaInner {
                upload_dir: config.upload_dir.clone(),
                output_dir: config.output_dir.clone(),
            }),
        }
    }

    /// Create both directories if they are missing
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.inner.upload_dir).await?;
        tokio::fs::create_dir_all(&self.inner.output_dir).await?;
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.inner.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.inner.output_dir
    }

    /// Open a new scope for one request
    pub fn scope(&self) -> RequestScope {
        RequestScope {
            id: Uuid::new_v4(),
            area: self.clone(),
        }
    }
}

/// Names and owns the staged files of one request
pub struct RequestScope {
    id: Uuid,
    area: StagingArea,
}

impl RequestScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Write an upload to the upload directory as `{uuid}_{name}`
    pub async fn stage(&self, upload: &Upload) -> io::Result<StagedFile> {
        let name = format!(
            "{}_{}",
            Uuid::new_v4(),
            sanitize_file_name(&upload.file_name)
        );
        let file = StagedFile::new(self.area.upload_dir().join(name), self.id, Role::Input);
        tokio::fs::write(file.path(), &upload.data).await?;

        tracing::debug!(
            request_id = %self.id,
            path = %file.path().display(),
            bytes = upload.data.len(),
            "Staged upload"
        );
        Ok(file)
    }

    /// Reserve a unique output path `{prefix}_{YYYYmmdd_HHMMSS}_{8 hex}.{ext}`
    ///
    /// Nothing is written; the file is released if it exists by then.
    pub fn allocate(&self, prefix: &str, extension: &str) -> StagedFile {
        let name = output_name(prefix, extension);
        StagedFile::new(self.area.output_dir().join(name), self.id, Role::Output)
    }

    /// Take ownership of a file produced elsewhere, e.g. by a converter
    pub fn adopt(&self, path: impl Into<PathBuf>, role: Role) -> StagedFile {
        StagedFile::new(path.into(), self.id, role)
    }
}

/// A file deleted exactly once, on release or drop
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    request_id: Uuid,
    role: Role,
    released: bool,
}

impl StagedFile {
    fn new(path: PathBuf, request_id: Uuid, role: Role) -> Self {
        Self {
            path,
            request_id,
            role,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Final path component, used as the download name
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Delete the file; later calls do nothing
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(
                request_id = %self.request_id,
                role = ?self.role,
                path = %self.path.display(),
                "Released staged file"
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                request_id = %self.request_id,
                path = %self.path.display(),
                "Failed to remove staged file: {}",
                e
            ),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.release();
    }
}

/// Stream `file` as a download; the body releases it when done or dropped
pub async fn attachment(
    file: StagedFile,
    content_type: &str,
    download_name: &str,
) -> io::Result<Response> {
    let handle = tokio::fs::File::open(file.path()).await?;
    let length = handle.metadata().await?.len();

    let stream = futures::stream::unfold(Some((handle, file)), |state| async move {
        let (mut handle, mut file) = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match handle.read(&mut buf).await {
            Ok(0) => {
                drop(handle);
                file.release();
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some((handle, file))))
            }
            Err(e) => Some((Err::<Vec<u8>, io::Error>(e), None)),
        }
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    sanitize_file_name(download_name)
                ),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Reduce a client-supplied name to a safe single path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn output_name(prefix: &str, extension: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.{}", prefix, timestamp, &suffix[..8], extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn area(dir: &TempDir) -> StagingArea {
        StagingArea::new(&StagingConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
        })
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\my file.pdf"), "my_file.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn test_output_name_shape() {
        let name = output_name("merged", "pdf");
        let parts: Vec<&str> = name.trim_end_matches(".pdf").split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "merged");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, output_name("merged", "pdf"));
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(Upload::new("Photo.JPG", vec![]).extension().as_deref(), Some("jpg"));
        assert_eq!(Upload::new("noext", vec![]).extension(), None);
    }

    #[tokio::test]
    async fn test_stage_and_release() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.ensure_dirs().await.unwrap();
        let scope = area.scope();

        let mut file = scope
            .stage(&Upload::new("in put.pdf", b"data".to_vec()))
            .await
            .unwrap();
        assert_eq!(file.role(), Role::Input);
        assert!(file.file_name().ends_with("_in_put.pdf"));
        assert_eq!(std::fs::read(file.path()).unwrap(), b"data");

        file.release();
        assert!(!file.path().exists());
        // Second release is a no-op
        file.release();
        drop(file);
        assert_eq!(entries(area.upload_dir()), 0);
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.ensure_dirs().await.unwrap();
        let scope = area.scope();

        {
            let _input = scope.stage(&Upload::new("a.pdf", vec![1])).await.unwrap();
            let output = scope.allocate("merged", "pdf");
            std::fs::write(output.path(), b"out").unwrap();
            assert_eq!(output.role(), Role::Output);
            assert_eq!(entries(area.output_dir()), 1);
        }

        assert_eq!(entries(area.upload_dir()), 0);
        assert_eq!(entries(area.output_dir()), 0);
    }

    #[tokio::test]
    async fn test_unwritten_allocation_releases_quietly() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.ensure_dirs().await.unwrap();

        let mut file = area.scope().allocate("split", "zip");
        assert!(!file.path().exists());
        file.release();
    }

    #[tokio::test]
    async fn test_adopted_file_is_released() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("converted.docx");
        std::fs::write(&path, b"docx").unwrap();

        let file = area(&dir).scope().adopt(&path, Role::Output);
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_attachment_streams_then_releases() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.ensure_dirs().await.unwrap();

        let file = area.scope().allocate("rotated", "pdf");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(file.path(), &payload).unwrap();
        let path = file.path().to_path_buf();

        let response = attachment(file, "application/pdf", "rotated_x.pdf")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"rotated_x.pdf\""
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "200000");
        assert!(path.exists());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dropped_attachment_releases() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.ensure_dirs().await.unwrap();

        let file = area.scope().allocate("split_pages", "zip");
        std::fs::write(file.path(), b"zip bytes").unwrap();
        let path = file.path().to_path_buf();

        let response = attachment(file, "application/zip", "split_pages.zip")
            .await
            .unwrap();
        drop(response);
        assert!(!path.exists());
    }
}

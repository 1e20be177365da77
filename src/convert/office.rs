//! LibreOffice headless conversion

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{run_with_deadline, ConvertError, DocumentConverter, TargetFormat};

/// Converts through `libreoffice --headless --convert-to`
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    binary: String,
    timeout: Duration,
}

impl OfficeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Command line for converting `input` into `out_dir`
    fn arguments(input: &Path, format: TargetFormat, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--headless".into()];

        if let Some(filter) = import_filter(input, format) {
            args.push(format!("--infilter={}", filter).into());
        }

        args.push("--convert-to".into());
        args.push(format.extension().into());
        args.push("--outdir".into());
        args.push(out_dir.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }
}

/// Input filter LibreOffice needs for inputs it would open in the wrong app
fn import_filter(input: &Path, format: TargetFormat) -> Option<&'static str> {
    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())?;

    match (extension.as_str(), format) {
        ("pdf", TargetFormat::Docx) => Some("writer_pdf_import"),
        ("pdf", TargetFormat::Pptx) => Some("impress_pdf_import"),
        _ => None,
    }
}

/// Where LibreOffice writes the result: the input stem with the new extension
fn expected_output(input: &Path, format: TargetFormat, out_dir: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or(input.as_os_str()).to_owned();
    name.push(".");
    name.push(format.extension());
    out_dir.join(name)
}

#[async_trait]
impl DocumentConverter for OfficeConverter {
    async fn convert(
        &self,
        input: &Path,
        format: TargetFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        let mut command = Command::new(&self.binary);
        command.args(Self::arguments(input, format, out_dir));

        tracing::debug!(
            input = %input.display(),
            format = format.extension(),
            "Running office conversion"
        );
        let output = run_with_deadline(command, "LibreOffice", self.timeout).await?;

        let produced = expected_output(input, format, out_dir);
        if !output.status.success() || !produced.exists() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                status = ?output.status.code(),
                stderr = %detail,
                "Office conversion failed"
            );
            let _ = tokio::fs::remove_file(&produced).await;
            return Err(ConvertError::Failed { detail });
        }

        Ok(produced)
    }
}

//! Document converters
//!
//! Office formats go through LibreOffice and web pages through
//! wkhtmltopdf, both run as subprocesses with a deadline. Routes only see
//! the [`DocumentConverter`] and [`UrlRenderer`] traits so tests can swap
//! in fakes. Extracted PDF text is written to XLSX in-process.

mod office;
mod spreadsheet;
mod web;

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

pub use office::OfficeConverter;
pub use spreadsheet::write_pages_xlsx;
pub use web::{is_web_url, WkHtmlToPdf};

/// Converter errors
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0} not installed")]
    Unavailable(String),

    #[error("Conversion timed out")]
    Timeout,

    /// Tool ran but produced no output; `detail` holds its stderr
    #[error("Conversion failed")]
    Failed { detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Formats the office converter can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        mime_guess::from_ext(self.extension())
            .first_raw()
            .unwrap_or("application/octet-stream")
    }
}

/// Office-suite conversion
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `input` to `format`, writing into `out_dir`
    ///
    /// Returns the path of the produced file; the caller owns it.
    async fn convert(
        &self,
        input: &Path,
        format: TargetFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, ConvertError>;
}

/// Web page capture
#[async_trait]
pub trait UrlRenderer: Send + Sync {
    /// Render `url` to a PDF at `output`
    async fn render(&self, url: &str, output: &Path) -> Result<(), ConvertError>;
}

/// Run `command` to completion, killing it once `deadline` passes
pub async fn run_with_deadline(
    mut command: Command,
    tool: &str,
    deadline: Duration,
) -> Result<Output, ConvertError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(deadline, command.output()).await {
        Err(_) => {
            tracing::warn!(tool, timeout_secs = deadline.as_secs(), "Converter timed out");
            Err(ConvertError::Timeout)
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConvertError::Unavailable(tool.to_string()))
        }
        Ok(Err(e)) => Err(ConvertError::Io(e)),
        Ok(Ok(output)) => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format_content_types() {
        assert_eq!(TargetFormat::Pdf.content_type(), "application/pdf");
        assert_eq!(
            TargetFormat::Docx.content_type(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(TargetFormat::Xlsx.extension(), "xlsx");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let command = Command::new("/nonexistent/bin/converter");
        let result = run_with_deadline(command, "converter", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ConvertError::Unavailable(tool)) if tool == "converter"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_tool_times_out() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let result = run_with_deadline(command, "sleep", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ConvertError::Timeout)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_captured() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2"]);
        let output = run_with_deadline(command, "sh", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
    }
}

//! Web page capture through wkhtmltopdf

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{run_with_deadline, ConvertError, UrlRenderer};

const PAGE_MARGIN: &str = "10mm";

/// Whether `url` is an absolute http(s) URL
pub fn is_web_url(url: &str) -> bool {
    let url = url.trim();
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

/// Renders web pages on A4 with 10mm margins
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    binary: String,
    timeout: Duration,
}

impl WkHtmlToPdf {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn arguments(url: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--page-size".into(), "A4".into()];
        for side in ["top", "right", "bottom", "left"] {
            args.push(format!("--margin-{}", side).into());
            args.push(PAGE_MARGIN.into());
        }
        args.extend(
            [
                "--encoding",
                "UTF-8",
                "--no-outline",
                "--enable-local-file-access",
                "--quiet",
            ]
            .map(OsString::from),
        );
        args.push(url.into());
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl UrlRenderer for WkHtmlToPdf {
    async fn render(&self, url: &str, output: &Path) -> Result<(), ConvertError> {
        let mut command = Command::new(&self.binary);
        command.args(Self::arguments(url, output));

        tracing::debug!(url, "Rendering web page");
        let result = run_with_deadline(command, "wkhtmltopdf", self.timeout).await?;

        // wkhtmltopdf exits non-zero on some page load warnings even when the PDF is fine
        if !output.exists() {
            let detail = String::from_utf8_lossy(&result.stderr).trim().to_string();
            tracing::error!(
                url,
                status = ?result.status.code(),
                stderr = %detail,
                "Web page capture failed"
            );
            return Err(ConvertError::Failed { detail });
        }
        if !result.status.success() {
            tracing::warn!(url, status = ?result.status.code(), "wkhtmltopdf reported errors");
        }
        Ok(())
    }
}

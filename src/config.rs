//! Configuration management for Pagewright Server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub staging: StagingConfig,
    pub converters: ConverterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
}

/// Where uploads and outputs live while a request runs
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    pub office_binary: String,
    pub html_to_pdf_binary: String,
    pub timeout: Duration,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                max_upload_bytes: 256 * 1024 * 1024,
            },
            staging: StagingConfig {
                upload_dir: PathBuf::from("./uploads"),
                output_dir: PathBuf::from("./outputs"),
            },
            converters: ConverterConfig {
                office_binary: "libreoffice".to_string(),
                html_to_pdf_binary: "wkhtmltopdf".to_string(),
                timeout: Duration::from_secs(120),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        let max_upload_mb: usize =
            parsed(&lookup, "MAX_UPLOAD_MB", defaults.server.max_upload_bytes / (1024 * 1024))?;
        let timeout_secs: u64 = parsed(
            &lookup,
            "CONVERTER_TIMEOUT_SECS",
            defaults.converters.timeout.as_secs(),
        )?;

        Ok(Config {
            server: ServerConfig {
                host: text("SERVER_HOST", defaults.server.host),
                port: parsed(&lookup, "SERVER_PORT", defaults.server.port)?,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            },
            staging: StagingConfig {
                upload_dir: lookup("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.staging.upload_dir),
                output_dir: lookup("OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.staging.output_dir),
            },
            converters: ConverterConfig {
                office_binary: text("OFFICE_BINARY", defaults.converters.office_binary),
                html_to_pdf_binary: text(
                    "HTML_TO_PDF_BINARY",
                    defaults.converters.html_to_pdf_binary,
                ),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}

//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::convert::{DocumentConverter, OfficeConverter, UrlRenderer, WkHtmlToPdf};
use crate::staging::StagingArea;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    staging: StagingArea,
    converter: Arc<dyn DocumentConverter>,
    renderer: Arc<dyn UrlRenderer>,
}

impl AppState {
    /// State backed by the configured LibreOffice and wkhtmltopdf binaries
    pub fn new(config: Config) -> Self {
        let converter = Arc::new(OfficeConverter::new(
            config.converters.office_binary.clone(),
            config.converters.timeout,
        ));
        let renderer = Arc::new(WkHtmlToPdf::new(
            config.converters.html_to_pdf_binary.clone(),
            config.converters.timeout,
        ));
        Self::with_converters(config, converter, renderer)
    }

    /// State with explicit converter implementations
    pub fn with_converters(
        config: Config,
        converter: Arc<dyn DocumentConverter>,
        renderer: Arc<dyn UrlRenderer>,
    ) -> Self {
        let staging = StagingArea::new(&config.staging);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                staging,
                converter,
                renderer,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the staging area
    pub fn staging(&self) -> &StagingArea {
        &self.inner.staging
    }

    /// Get the office document converter
    pub fn converter(&self) -> &dyn DocumentConverter {
        self.inner.converter.as_ref()
    }

    /// Get the web page renderer
    pub fn renderer(&self) -> &dyn UrlRenderer {
        self.inner.renderer.as_ref()
    }
}

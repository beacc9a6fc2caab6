//! Configuration types for the extraction queue.
//!
//! All pipeline behaviour is controlled through [`QueueConfig`], built via
//! its [`QueueConfigBuilder`]. One struct for every knob makes it trivial to
//! share the config between the orchestrator and its collaborators and to log
//! it when a run misbehaves.
//!
//! The credential is deliberately **not** part of the config: it is a
//! parameter of [`crate::queue::QueueOrchestrator::start`] and never stored.

use crate::error::KksError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default Gemini REST endpoint base.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default extraction model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default file name of the exported recap table.
pub const DEFAULT_EXPORT_FILENAME: &str = "Rekap_KKS.csv";

/// Configuration for the extraction queue.
///
/// # Example
/// ```rust
/// use kks_rekap::QueueConfig;
///
/// let config = QueueConfig::builder()
///     .max_pages(6)
///     .jpeg_quality(85)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 6);
/// ```
#[derive(Clone)]
pub struct QueueConfig {
    /// Maximum number of pages rasterised per document. Default: 8.
    ///
    /// Contracts carry their signatures and payment clauses in the first few
    /// pages; the cap bounds both render time and request size.
    pub max_pages: usize,

    /// Scale factor applied to each page's natural size when rendering. Default: 1.5.
    pub render_scale: f32,

    /// JPEG quality (1–100) for the page images. Default: 80.
    pub jpeg_quality: u8,

    /// Extraction model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Base URL of the Gemini REST API.
    pub api_base: String,

    /// Per-extraction-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Retry attempts on a transient extraction failure. Default: 2.
    ///
    /// This is transport-level retrying inside one extraction call; a
    /// document that still fails is marked `error` and never re-queued.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// What the orchestrator does when the extractor fails. Default: [`ExtractionFailurePolicy::Surface`].
    pub extraction_failure: ExtractionFailurePolicy,

    /// Directory containing the pdfium shared library. `None` binds to the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// File name of the exported recap table. Default: `Rekap_KKS.csv`.
    pub export_filename: String,

    /// Optional progress callback for per-document events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_pages: 8,
            render_scale: 1.5,
            jpeg_quality: 80,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
            temperature: 0.1,
            extraction_failure: ExtractionFailurePolicy::default(),
            pdfium_lib_path: None,
            export_filename: DEFAULT_EXPORT_FILENAME.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConfig")
            .field("max_pages", &self.max_pages)
            .field("render_scale", &self.render_scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .field("extraction_failure", &self.extraction_failure)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("export_filename", &self.export_filename)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn QueueProgressCallback>"),
            )
            .finish()
    }
}

impl QueueConfig {
    /// Create a new builder for `QueueConfig`.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`QueueConfig`].
#[derive(Debug)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 4.0);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn extraction_failure(mut self, policy: ExtractionFailurePolicy) -> Self {
        self.config.extraction_failure = policy;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn export_filename(mut self, name: impl Into<String>) -> Self {
        self.config.export_filename = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<QueueConfig, KksError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(KksError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.model.trim().is_empty() {
            return Err(KksError::InvalidConfig("model must not be empty".into()));
        }
        if !c.api_base.starts_with("http://") && !c.api_base.starts_with("https://") {
            return Err(KksError::InvalidConfig(format!(
                "api_base must be an HTTP/HTTPS URL, got '{}'",
                c.api_base
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(KksError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.export_filename.trim().is_empty() {
            return Err(KksError::InvalidConfig(
                "export_filename must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// How an extraction failure is reflected in the queue.
///
/// The service can fail in ways that look like an ordinary answer (an empty
/// record). `Surface` keeps failures visible as `error` items; `Sentinel`
/// records the empty [`crate::contract::ContractData::sentinel`] as a
/// successful result instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionFailurePolicy {
    /// Mark the document `error`; no result record. (default)
    #[default]
    Surface,
    /// Mark the document `done` with the sentinel record.
    Sentinel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = QueueConfig::default();
        assert_eq!(c.max_pages, 8);
        assert_eq!(c.jpeg_quality, 80);
        assert!((c.render_scale - 1.5).abs() < f32::EPSILON);
        assert_eq!(c.model, "gemini-2.5-flash");
        assert_eq!(c.export_filename, "Rekap_KKS.csv");
        assert_eq!(c.extraction_failure, ExtractionFailurePolicy::Surface);
    }

    #[test]
    fn builder_clamps_quality_and_scale() {
        let c = QueueConfig::builder()
            .jpeg_quality(0)
            .render_scale(10.0)
            .build()
            .unwrap();
        assert_eq!(c.jpeg_quality, 1);
        assert!((c.render_scale - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_pages_is_rejected() {
        let err = QueueConfig::builder().max_pages(0).build().unwrap_err();
        assert!(matches!(err, KksError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_api_base_is_rejected() {
        let err = QueueConfig::builder()
            .api_base("ftp://example.org")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("api_base"));
    }

    #[test]
    fn debug_hides_callback() {
        let c = QueueConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn QueueProgressCallback>"));
    }
}

//! Error types for the kks-rekap library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`KksError`]: **Fatal**: the operation cannot proceed at all (no
//!   credential, invalid configuration, unreadable input, export write
//!   failure). Returned as `Err(KksError)` from the public entry points and
//!   never mutates queue state.
//!
//! * [`ItemError`]: **Non-fatal**: a single document failed (corrupt PDF,
//!   page that will not render, extraction call that failed). Stored on the
//!   [`crate::queue::QueueItem`] that moved to `error`; the run continues
//!   with the next pending document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the kks-rekap library.
///
/// Per-document failures use [`ItemError`] and are recorded on the queue
/// item rather than propagated here.
#[derive(Debug, Error)]
pub enum KksError {
    // ── Credential / config errors ────────────────────────────────────────
    /// `start` was called without an extraction credential.
    #[error("An API key is required before processing can start.\nProvide it with --api-key or GEMINI_API_KEY.")]
    CredentialRequired,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An edgequake-llm provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Could not create or write the export artifact.
    #[error("Failed to write export file '{path}': {source}")]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV writer rejected a record.
    #[error("Failed to serialise export rows: {0}")]
    ExportEncoding(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single queued document.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ItemError {
    /// The pdfium library could not be loaded.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH to the directory containing libpdfium.")]
    PdfiumUnavailable(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// A page could not be drawn.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// A rendered page could not be JPEG-encoded.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// The document produced no pages to send.
    #[error("Document has no renderable pages")]
    NoPages,

    /// The extraction call failed after retries.
    #[error("Extraction failed after {retries} retries: {detail}")]
    ExtractionFailed { retries: u32, detail: String },

    /// The extraction call timed out.
    #[error("Extraction timed out after {secs}s")]
    ExtractionTimeout { secs: u64 },

    /// The service answered but the payload was not a contract record.
    #[error("Extraction response could not be parsed: {detail}")]
    InvalidResponse { detail: String },

    /// The blocking render task died.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_required_mentions_api_key() {
        let msg = KksError::CredentialRequired.to_string();
        assert!(msg.contains("API key"), "got: {msg}");
    }

    #[test]
    fn render_failed_display() {
        let e = ItemError::RenderFailed {
            page: 3,
            detail: "bad stream".into(),
        };
        assert!(e.to_string().contains("Page 3"));
        assert!(e.to_string().contains("bad stream"));
    }

    #[test]
    fn extraction_failed_display() {
        let e = ItemError::ExtractionFailed {
            retries: 2,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("2 retries"), "got: {msg}");
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn extraction_timeout_display() {
        let e = ItemError::ExtractionTimeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn export_failed_keeps_source() {
        let e = KksError::ExportFailed {
            path: PathBuf::from("/tmp/out.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&e).is_some());
        assert!(e.to_string().contains("out.csv"));
    }
}

//! Input resolution: turn a user-supplied path or URL into an in-memory [`Document`].
//!
//! pdfium loads PDFs from a byte slice just as well as from a path, so
//! documents are read (or downloaded) fully into memory and carried through
//! the queue as blobs. The declared media type is sniffed from the `%PDF`
//! magic bytes, falling back to the file extension; anything that is not
//! `application/pdf` is later dropped by [`crate::queue::QueueOrchestrator::enqueue`].

use crate::error::KksError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The only media type the queue accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A document blob with its display name and declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl Document {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Shorthand for a document declared as `application/pdf`.
    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, PDF_MEDIA_TYPE, bytes)
    }

    /// Build a document from raw bytes, sniffing the media type.
    pub fn sniffed(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = sniff_media_type(&name, &bytes);
        Self::new(name, media_type, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A cheap handle to the blob, for moving onto a blocking thread.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Guess the media type of a blob: `%PDF` magic first, then the extension.
pub fn sniff_media_type(name: &str, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return PDF_MEDIA_TYPE;
    }
    let has_pdf_ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if has_pdf_ext {
        PDF_MEDIA_TYPE
    } else {
        "application/octet-stream"
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
///
/// URLs are downloaded with the given timeout; anything else is read as a
/// local path.
pub async fn resolve_document(input: &str, timeout_secs: u64) -> Result<Document, KksError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file.
async fn read_local(path_str: &str) -> Result<Document, KksError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => KksError::PermissionDenied { path: path.clone() },
        _ => KksError::FileNotFound { path: path.clone() },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
    Ok(Document::sniffed(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, KksError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| KksError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            KksError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            KksError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(KksError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| KksError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let name = filename_from_url(url);
    info!("Downloaded {} ({} bytes)", name, bytes.len());

    // Trust the magic bytes over a generic server content type.
    match declared {
        Some(ct) if ct.eq_ignore_ascii_case(PDF_MEDIA_TYPE) => Ok(Document::pdf(name, bytes)),
        _ => Ok(Document::sniffed(name, bytes)),
    }
}

/// Extract a reasonable display name from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

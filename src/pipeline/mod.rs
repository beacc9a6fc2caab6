//! Pipeline stages behind the queue orchestrator.
//!
//! Each submodule implements one transformation step. The orchestrator only
//! sees the three collaborator traits ([`Rasterizer`], [`Extractor`],
//! [`Aggregator`]), so tests drive it with stubs and the CLI can swap the
//! Gemini extractor for an edgequake-llm provider.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ extract ──▶ postprocess ──▶ export
//! (path/URL) (pdfium)  (JPEG)   (Gemini/llm)  (JSON cleanup)   (CSV)
//! ```
//!
//! 1. [`input`]: read or download the document into memory
//! 2. [`render`]: rasterise the first pages; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: JPEG-encode and base64-wrap each page
//! 4. [`extract`] / [`llm`]: one extraction call per document with
//!    retry/backoff; the only stage with network I/O besides URL input
//! 5. [`postprocess`]: turn the model answer into a clean record
//! 6. [`export`]: write the result collection as one table

pub mod encode;
pub mod export;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;

pub use export::{Aggregator, CsvAggregator, JsonAggregator};
pub use extract::{Extractor, GeminiExtractor};
pub use llm::LlmExtractor;
pub use render::{PdfiumRasterizer, Rasterizer};

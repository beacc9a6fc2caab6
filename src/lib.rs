//! # kks-rekap
//!
//! Turn scanned KKS cooperation contracts ("Kesepakatan Kerja Sama") into one
//! recap table using a vision model.
//!
//! ## Why this crate?
//!
//! The contracts arrive as PDFs, many of them scans, with the interesting
//! values (parties, contract numbers, per-person costs, bank account) spread
//! over the first few pages in inconsistent layouts. Text extraction tools
//! lose most of it. Instead each document's first pages are rasterised to
//! JPEG and a vision model reads them against a fixed response schema.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF blobs
//!  │
//!  ├─ enqueue    keep application/pdf only, assign ids, status pending
//!  ├─ start      one document at a time, in insertion order:
//!  │    ├─ rasterise  first 8 pages via pdfium (spawn_blocking), JPEG q80
//!  │    ├─ extract    one schema-constrained Gemini call with the credential
//!  │    └─ commit     result record + status done (or error)
//!  └─ export     result collection → Rekap_KKS.csv
//! ```
//!
//! A [`QueueOrchestrator::reset`] at any point empties the queue and the
//! results; a run that was waiting on pdfium or on the model notices on
//! wake-up and stops without writing anything.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kks_rekap::{CsvAggregator, Document, QueueConfig, QueueOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = QueueConfig::default();
//!     let queue = QueueOrchestrator::from_config(&config)?;
//!
//!     queue.enqueue(vec![Document::sniffed("kks-001.pdf", std::fs::read("kks-001.pdf")?)]);
//!     let outcome = queue.start(&std::env::var("GEMINI_API_KEY")?).await?;
//!     eprintln!("{outcome:?}");
//!
//!     let path = queue.export(&CsvAggregator::new(), std::path::Path::new("."))?;
//!     println!("{}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `kks-rekap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! kks-rekap = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod contract;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod queue;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionFailurePolicy, QueueConfig, QueueConfigBuilder};
pub use contract::{ContractData, ContractType};
pub use error::{ItemError, KksError};
pub use pipeline::encode::PageImage;
pub use pipeline::input::{resolve_document, Document};
pub use pipeline::{
    Aggregator, CsvAggregator, Extractor, GeminiExtractor, JsonAggregator, LlmExtractor,
    PdfiumRasterizer, Rasterizer,
};
pub use progress::{NoopProgressCallback, ProgressCallback, QueueProgressCallback};
pub use queue::{
    ItemId, ItemStatus, QueueItem, QueueItemView, QueueOrchestrator, ResultRecord, RunOutcome,
    RunSummary,
};

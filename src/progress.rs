//! Progress-callback trait for per-document queue events.
//!
//! Inject an [`Arc<dyn QueueProgressCallback>`] via
//! [`crate::config::QueueConfigBuilder::progress_callback`] to receive events
//! as the orchestrator drains the queue.
//!
//! Callbacks are invoked outside the orchestrator's state lock, so an
//! implementation may read the queue (`items()`, `results()`) from inside a
//! callback without deadlocking.
//!
//! # Example
//!
//! ```rust
//! use kks_rekap::{ItemId, QueueConfig, QueueProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl QueueProgressCallback for CountingCallback {
//!     fn on_item_done(&self, _id: ItemId, name: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {name} done");
//!     }
//! }
//!
//! let config = QueueConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::queue::ItemId;
use std::sync::Arc;

/// Called by the orchestrator as it processes each queued document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait QueueProgressCallback: Send + Sync {
    /// Called once when a run starts.
    ///
    /// # Arguments
    /// * `pending`: number of documents pending at run start
    fn on_run_start(&self, pending: usize) {
        let _ = pending;
    }

    /// Called when a document moves to `processing`.
    fn on_item_start(&self, id: ItemId, name: &str) {
        let _ = (id, name);
    }

    /// Called when a document is committed as `done`.
    fn on_item_done(&self, id: ItemId, name: &str) {
        let _ = (id, name);
    }

    /// Called when a document is marked `error`.
    fn on_item_error(&self, id: ItemId, name: &str, error: &str) {
        let _ = (id, name, error);
    }

    /// Called when a reset stopped the run.
    ///
    /// # Arguments
    /// * `in_flight`: the document the run was holding, or `None` when the
    ///   reset landed between two documents
    fn on_run_aborted(&self, in_flight: Option<(ItemId, &str)>) {
        let _ = in_flight;
    }

    /// Called once when the queue has no pending document left.
    ///
    /// # Arguments
    /// * `done`  : documents committed during this run
    /// * `failed`: documents marked `error` during this run
    fn on_run_complete(&self, done: usize, failed: usize) {
        let _ = (done, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl QueueProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::QueueConfig`].
pub type ProgressCallback = Arc<dyn QueueProgressCallback>;

//! The sequential queue orchestrator.
//!
//! [`QueueOrchestrator`] owns the work queue and the result collection and
//! drives one document at a time through rasterize → extract → commit.
//!
//! ## Cancellation
//!
//! There is no explicit cancel call. [`QueueOrchestrator::reset`] empties the
//! queue and bumps a reset epoch; a run that wakes up from a collaborator
//! call checks that its epoch is still current and that its item still
//! exists before writing anything. If either check fails the run stops
//! without touching state, since the queue it was draining no longer exists
//! and a new run may already own the active-run flag.
//!
//! ## Locking
//!
//! State sits behind a `std::sync::Mutex` that is only held for short,
//! synchronous sections and never across an `.await`, so `reset()`,
//! `enqueue()` and the views stay responsive while a document is in flight.

mod state;

pub use state::{ItemId, ItemStatus, QueueItem, QueueItemView, ResultRecord};

use crate::config::{ExtractionFailurePolicy, QueueConfig};
use crate::contract::ContractData;
use crate::error::{ItemError, KksError};
use crate::pipeline::export::{self, Aggregator};
use crate::pipeline::extract::{Extractor, GeminiExtractor};
use crate::pipeline::input::Document;
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use state::QueueState;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// How a call to [`QueueOrchestrator::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run was active; nothing happened.
    AlreadyRunning,
    /// No document was pending; nothing happened.
    NothingPending,
    /// The queue drained.
    Completed(RunSummary),
    /// A reset invalidated the in-flight document and the run stopped.
    Aborted,
}

/// Counts for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub failed: usize,
}

/// Sequential rasterize → extract driver with reset-based cancellation.
pub struct QueueOrchestrator {
    rasterizer: Arc<dyn Rasterizer>,
    extractor: Arc<dyn Extractor>,
    failure_policy: ExtractionFailurePolicy,
    export_filename: String,
    progress: ProgressCallback,
    state: Mutex<QueueState>,
}

impl std::fmt::Debug for QueueOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("QueueOrchestrator")
            .field("items", &st.items.len())
            .field("results", &st.results.len())
            .field("running", &st.running)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

/// How one claimed item resolved.
enum Step {
    Done,
    Failed,
    /// The item lost its identity to a reset.
    Lost,
}

/// Releases the active-run flag when a `start` future is dropped mid-run.
///
/// The claimed document goes back to `pending` so a later run picks it up.
/// Nothing happens if a reset already ended the run's epoch.
struct RunGuard<'a> {
    state: &'a Mutex<QueueState>,
    epoch: u64,
    armed: bool,
}

impl RunGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if st.epoch != self.epoch {
            return;
        }
        st.running = false;
        let released = st.release_claimed();
        warn!(
            "Run dropped before finishing; {} document(s) returned to pending",
            released
        );
    }
}

impl QueueOrchestrator {
    /// Build an orchestrator around explicit collaborators.
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        extractor: Arc<dyn Extractor>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            rasterizer,
            extractor,
            failure_policy: config.extraction_failure,
            export_filename: config.export_filename.clone(),
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
            state: Mutex::new(QueueState::default()),
        }
    }

    /// pdfium rasterizer + Gemini extractor, both configured from `config`.
    pub fn from_config(config: &QueueConfig) -> Result<Self, KksError> {
        let rasterizer = Arc::new(PdfiumRasterizer::new(config));
        let extractor = Arc::new(GeminiExtractor::new(config)?);
        Ok(Self::new(rasterizer, extractor, config))
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Mutating operations ───────────────────────────────────────────────

    /// Append the PDF documents as `pending` items, in input order.
    ///
    /// Documents of any other media type are dropped silently. Returns the
    /// ids assigned to the accepted documents.
    pub fn enqueue<I>(&self, documents: I) -> Vec<ItemId>
    where
        I: IntoIterator<Item = Document>,
    {
        let accepted: Vec<Document> = documents
            .into_iter()
            .filter(|d| {
                let ok = d.is_pdf();
                if !ok {
                    debug!("Dropping {} ({}): not a PDF", d.name(), d.media_type());
                }
                ok
            })
            .collect();

        if accepted.is_empty() {
            return Vec::new();
        }

        let ids = self.lock().push_all(accepted);
        info!("Enqueued {} document(s)", ids.len());
        ids
    }

    /// Drain the queue with `credential` passed to every extraction call.
    ///
    /// Returns `Err(CredentialRequired)` without touching state when the
    /// credential is blank. Resolves when the queue has no pending item left
    /// or a reset aborted the run.
    pub async fn start(&self, credential: &str) -> Result<RunOutcome, KksError> {
        if credential.trim().is_empty() {
            return Err(KksError::CredentialRequired);
        }

        let (epoch, pending) = {
            let mut st = self.lock();
            if st.running {
                return Ok(RunOutcome::AlreadyRunning);
            }
            let pending = st.pending_count();
            if pending == 0 {
                return Ok(RunOutcome::NothingPending);
            }
            st.running = true;
            (st.epoch, pending)
        };
        let mut guard = RunGuard {
            state: &self.state,
            epoch,
            armed: true,
        };

        info!("Run started: {} pending document(s)", pending);
        self.progress.on_run_start(pending);

        let mut summary = RunSummary::default();
        loop {
            let next = {
                let mut st = self.lock();
                if st.epoch != epoch {
                    drop(st);
                    info!("Run aborted: queue was reset between documents");
                    self.progress.on_run_aborted(None);
                    return Ok(RunOutcome::Aborted);
                }
                let next = st.claim_next();
                if next.is_none() {
                    st.running = false;
                    guard.disarm();
                }
                next
            };

            let Some((id, document)) = next else {
                break;
            };

            match self.process(epoch, id, &document, credential).await {
                Step::Done => summary.done += 1,
                Step::Failed => summary.failed += 1,
                Step::Lost => {
                    info!("Run aborted: {} was removed by a reset", document.name());
                    self.progress.on_run_aborted(Some((id, document.name())));
                    return Ok(RunOutcome::Aborted);
                }
            }
        }

        info!(
            "Run complete: {} done, {} failed",
            summary.done, summary.failed
        );
        self.progress.on_run_complete(summary.done, summary.failed);
        Ok(RunOutcome::Completed(summary))
    }

    /// Take one claimed item through both collaborators and commit it.
    async fn process(
        &self,
        epoch: u64,
        id: ItemId,
        document: &Document,
        credential: &str,
    ) -> Step {
        let name = document.name();
        info!("Processing {}", name);
        self.progress.on_item_start(id, name);

        let pages = match self.rasterizer.rasterize(document).await {
            Ok(pages) => pages,
            Err(e) => return self.record_failure(epoch, id, name, &e),
        };

        if !self.lock().holds(epoch, id) {
            return Step::Lost;
        }
        debug!("{}: {} page(s) rasterised", name, pages.len());

        let extracted = self.extractor.extract(&pages, credential).await;
        drop(pages);

        let data = match extracted {
            Ok(data) => data,
            Err(e) => match self.failure_policy {
                ExtractionFailurePolicy::Surface => {
                    return self.record_failure(epoch, id, name, &e);
                }
                ExtractionFailurePolicy::Sentinel => {
                    warn!("{}: extraction failed, recording empty record: {}", name, e);
                    ContractData::sentinel()
                }
            },
        };

        {
            let mut st = self.lock();
            if !st.holds(epoch, id) {
                return Step::Lost;
            }
            st.results.push(ResultRecord {
                id,
                source_name: name.to_string(),
                extracted_data: data,
            });
            if let Some(item) = st.find_mut(id) {
                item.status = ItemStatus::Done;
            }
        }

        info!("{} done", name);
        self.progress.on_item_done(id, name);
        Step::Done
    }

    /// Mark the item `error` if it still belongs to this run.
    fn record_failure(&self, epoch: u64, id: ItemId, name: &str, err: &ItemError) -> Step {
        let message = err.to_string();
        {
            let mut st = self.lock();
            if !st.holds(epoch, id) {
                return Step::Lost;
            }
            if let Some(item) = st.find_mut(id) {
                item.status = ItemStatus::Error;
                item.last_error = Some(message.clone());
            }
        }

        error!("{} failed: {}", name, message);
        self.progress.on_item_error(id, name, &message);
        Step::Failed
    }

    /// Empty the queue and the results and invalidate in-flight work.
    ///
    /// Confirmation is the caller's job.
    pub fn reset(&self) {
        let mut st = self.lock();
        let (items, results) = (st.items.len(), st.results.len());
        st.clear();
        info!("Queue reset: dropped {} item(s), {} result(s)", items, results);
    }

    /// Remove one result record. The queue item is left as it is.
    pub fn remove_result(&self, id: ItemId) -> bool {
        let mut st = self.lock();
        let before = st.results.len();
        st.results.retain(|r| r.id != id);
        before != st.results.len()
    }

    // ── Views ─────────────────────────────────────────────────────────────

    pub fn items(&self) -> Vec<QueueItemView> {
        self.lock().items.iter().map(QueueItem::view).collect()
    }

    pub fn results(&self) -> Vec<ResultRecord> {
        self.lock().results.clone()
    }

    /// Extracted data of every result, in result order.
    pub fn records(&self) -> Vec<ContractData> {
        self.lock()
            .results
            .iter()
            .map(|r| r.extracted_data.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    // ── Export ────────────────────────────────────────────────────────────

    /// File name of the export artifact for `aggregator`.
    pub fn export_file_name(&self, aggregator: &dyn Aggregator) -> PathBuf {
        Path::new(&self.export_filename).with_extension(aggregator.extension())
    }

    /// Write the current results into `dir` under the fixed export name.
    pub fn export(&self, aggregator: &dyn Aggregator, dir: &Path) -> Result<PathBuf, KksError> {
        let records = self.records();
        let path = dir.join(self.export_file_name(aggregator));
        export::export_to_path(aggregator, &records, &path)
    }

    /// Write the current results to an arbitrary writer.
    pub fn export_to_writer(
        &self,
        aggregator: &dyn Aggregator,
        out: &mut dyn Write,
    ) -> Result<(), KksError> {
        aggregator.write_records(&self.records(), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::PageImage;
    use crate::pipeline::export::CsvAggregator;
    use async_trait::async_trait;

    struct OnePage;

    #[async_trait]
    impl Rasterizer for OnePage {
        async fn rasterize(&self, _document: &Document) -> Result<Vec<PageImage>, ItemError> {
            Ok(vec![PageImage {
                page_num: 1,
                mime_type: "image/jpeg",
                data: String::new(),
            }])
        }
    }

    struct EchoName;

    #[async_trait]
    impl Extractor for EchoName {
        async fn extract(
            &self,
            pages: &[PageImage],
            credential: &str,
        ) -> Result<ContractData, ItemError> {
            Ok(ContractData {
                pihak1: format!("{} page(s)", pages.len()),
                pihak2: credential.to_string(),
                ..Default::default()
            })
        }
    }

    fn orchestrator() -> QueueOrchestrator {
        QueueOrchestrator::new(Arc::new(OnePage), Arc::new(EchoName), &QueueConfig::default())
    }

    #[test]
    fn enqueue_drops_non_pdf() {
        let q = orchestrator();
        let ids = q.enqueue(vec![
            Document::pdf("a.pdf", vec![]),
            Document::new("b.png", "image/png", vec![]),
        ]);
        assert_eq!(ids.len(), 1);
        assert_eq!(q.items()[0].source_name, "a.pdf");
        assert!(q.enqueue(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn credential_reaches_extractor_unmodified() {
        let q = orchestrator();
        q.enqueue(vec![Document::pdf("a.pdf", vec![])]);
        let outcome = q.start(" key-with-spaces ").await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunSummary { done: 1, failed: 0 })
        );
        assert_eq!(q.results()[0].extracted_data.pihak2, " key-with-spaces ");
        assert_eq!(q.results()[0].extracted_data.pihak1, "1 page(s)");
    }

    #[tokio::test]
    async fn start_without_pending_is_noop() {
        let q = orchestrator();
        assert_eq!(q.start("k").await.unwrap(), RunOutcome::NothingPending);
        assert!(!q.is_running());
    }

    #[test]
    fn remove_result_leaves_item() {
        let q = orchestrator();
        let ids = q.enqueue(vec![Document::pdf("a.pdf", vec![])]);
        q.lock().results.push(ResultRecord {
            id: ids[0],
            source_name: "a.pdf".into(),
            extracted_data: ContractData::default(),
        });

        assert!(q.remove_result(ids[0]));
        assert!(!q.remove_result(ids[0]));
        assert_eq!(q.items().len(), 1);
    }

    #[test]
    fn export_name_follows_aggregator() {
        let q = orchestrator();
        assert_eq!(
            q.export_file_name(&CsvAggregator::new()),
            PathBuf::from("Rekap_KKS.csv")
        );
        assert_eq!(
            q.export_file_name(&crate::pipeline::export::JsonAggregator),
            PathBuf::from("Rekap_KKS.json")
        );
    }
}

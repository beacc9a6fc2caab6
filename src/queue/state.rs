//! Queue state model: items, results, the active-run flag and the reset epoch.

use crate::contract::ContractData;
use crate::pipeline::input::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identifier assigned to a document at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First eight hex digits, for tables and log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle of a queued document.
///
/// `Pending → Processing → Done | Error`. Resolved items are never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A document in the work queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: ItemId,
    pub payload: Arc<Document>,
    pub status: ItemStatus,
    /// Message of the failure that moved the item to `error`.
    pub last_error: Option<String>,
}

impl QueueItem {
    fn new(payload: Document) -> Self {
        Self {
            id: ItemId::new(),
            payload: Arc::new(payload),
            status: ItemStatus::Pending,
            last_error: None,
        }
    }

    pub fn view(&self) -> QueueItemView {
        QueueItemView {
            id: self.id,
            source_name: self.payload.name().to_string(),
            status: self.status,
            error: self.last_error.clone(),
        }
    }
}

/// Display tuple for one queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItemView {
    pub id: ItemId,
    pub source_name: String,
    pub status: ItemStatus,
    pub error: Option<String>,
}

/// A successful extraction, keyed by the originating item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: ItemId,
    pub source_name: String,
    pub extracted_data: ContractData,
}

/// Everything the orchestrator guards with its lock.
///
/// `epoch` increments on every reset. A run captures it at start and treats
/// any later mismatch as loss of identity for the item it holds.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) items: Vec<QueueItem>,
    pub(crate) results: Vec<ResultRecord>,
    pub(crate) running: bool,
    pub(crate) epoch: u64,
}

impl QueueState {
    /// Append documents as `pending` items; returns the assigned ids.
    pub(crate) fn push_all(&mut self, documents: Vec<Document>) -> Vec<ItemId> {
        let start = self.items.len();
        self.items.extend(documents.into_iter().map(QueueItem::new));
        self.items[start..].iter().map(|i| i.id).collect()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .count()
    }

    pub(crate) fn find_mut(&mut self, id: ItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Mark the earliest pending item `processing` and hand out its payload.
    pub(crate) fn claim_next(&mut self) -> Option<(ItemId, Arc<Document>)> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.status == ItemStatus::Pending)?;
        item.status = ItemStatus::Processing;
        Some((item.id, Arc::clone(&item.payload)))
    }

    /// Put every `processing` item back to `pending`; returns how many.
    pub(crate) fn release_claimed(&mut self) -> usize {
        let mut released = 0;
        for item in &mut self.items {
            if item.status == ItemStatus::Processing {
                item.status = ItemStatus::Pending;
                released += 1;
            }
        }
        released
    }

    /// Whether `id` still belongs to the run that started in `epoch`.
    pub(crate) fn holds(&self, epoch: u64, id: ItemId) -> bool {
        self.epoch == epoch && self.items.iter().any(|i| i.id == id)
    }

    /// Drop every item and result and invalidate in-flight work.
    pub(crate) fn clear(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.running = false;
        self.items.clear();
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Document {
        Document::pdf(name, b"%PDF-1.4".to_vec())
    }

    #[test]
    fn ids_are_unique() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn claim_next_takes_earliest_pending() {
        let mut st = QueueState::default();
        let ids = st.push_all(vec![doc("a.pdf"), doc("b.pdf")]);

        let (first, payload) = st.claim_next().unwrap();
        assert_eq!(first, ids[0]);
        assert_eq!(payload.name(), "a.pdf");
        assert_eq!(st.items[0].status, ItemStatus::Processing);

        st.find_mut(first).unwrap().status = ItemStatus::Error;
        let (second, _) = st.claim_next().unwrap();
        assert_eq!(second, ids[1]);
        assert!(st.claim_next().is_none());
    }

    #[test]
    fn release_claimed_returns_item_to_pending() {
        let mut st = QueueState::default();
        st.push_all(vec![doc("a.pdf"), doc("b.pdf")]);
        st.claim_next().unwrap();

        assert_eq!(st.release_claimed(), 1);
        assert_eq!(st.pending_count(), 2);
        assert_eq!(st.claim_next().unwrap().1.name(), "a.pdf");
    }

    #[test]
    fn clear_bumps_epoch_and_drops_everything() {
        let mut st = QueueState::default();
        let ids = st.push_all(vec![doc("a.pdf")]);
        st.running = true;
        assert!(st.holds(0, ids[0]));

        st.clear();
        assert_eq!(st.epoch, 1);
        assert!(!st.running);
        assert!(st.items.is_empty());
        assert!(!st.holds(0, ids[0]));
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert!(ItemStatus::Done.is_resolved());
        assert!(!ItemStatus::Pending.is_resolved());
    }
}

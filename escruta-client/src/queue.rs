//! Offline Queue
//!
//! Durable FIFO of submissions awaiting delivery. The backing file is the
//! durable truth: every mutation writes the file (atomically, via temp file
//! and rename) before the change becomes visible, and a failed write rolls
//! the in-memory state back. `open` on an existing path restores the queue
//! after a process restart.

use chrono::Utc;
use escruta_core::{
    AttentionReason, EntityIdType, LocalSubmissionId, PendingSubmission, QueueConfig, QueueError,
    ReportSubmission,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

// ============================================================================
// QUEUE STATS
// ============================================================================

/// Queue depth snapshot, published on a watch channel for UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Items still in the automatic retry rotation.
    pub queued: usize,
    /// Items parked for manual review.
    pub needs_attention: usize,
}

fn stats_of(items: &[PendingSubmission]) -> QueueStats {
    let queued = items.iter().filter(|item| item.is_retryable()).count();
    QueueStats {
        queued,
        needs_attention: items.len() - queued,
    }
}

// ============================================================================
// OFFLINE QUEUE
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct QueueFile {
    items: Vec<PendingSubmission>,
}

/// File-backed submission queue for one field device.
#[derive(Debug)]
pub struct OfflineQueue {
    path: PathBuf,
    config: QueueConfig,
    items: Mutex<Vec<PendingSubmission>>,
    stats_tx: watch::Sender<QueueStats>,
}

impl OfflineQueue {
    /// Open the queue at `path`, restoring any persisted items. A missing
    /// file starts an empty queue; a corrupt file fails loudly.
    pub fn open(path: impl Into<PathBuf>, config: QueueConfig) -> Result<Self, QueueError> {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<QueueFile>(&contents)?.items,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(QueueError::Io(e)),
        };
        let (stats_tx, _) = watch::channel(stats_of(&items));
        Ok(Self {
            path,
            config,
            items: Mutex::new(items),
            stats_tx,
        })
    }

    /// Queue a submission for delivery. Persists before returning; fails
    /// with `QuotaExceeded` at capacity rather than dropping anything.
    pub fn enqueue(&self, submission: ReportSubmission) -> Result<LocalSubmissionId, QueueError> {
        let mut items = self.lock()?;
        if items.len() >= self.config.max_items {
            return Err(QueueError::QuotaExceeded {
                capacity: self.config.max_items,
            });
        }
        let item = PendingSubmission::new(submission, Utc::now());
        let local_id = item.local_id;
        items.push(item);
        if let Err(e) = self.persist(&items) {
            items.pop();
            return Err(e);
        }
        self.publish_stats(&items);
        Ok(local_id)
    }

    /// Items eligible for automatic delivery, oldest first.
    pub fn pending(&self) -> Result<Vec<PendingSubmission>, QueueError> {
        let items = self.lock()?;
        let mut pending: Vec<PendingSubmission> = items
            .iter()
            .filter(|item| item.is_retryable())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.local_id.cmp(&b.local_id)));
        Ok(pending)
    }

    /// Items parked for manual review.
    pub fn attention(&self) -> Result<Vec<PendingSubmission>, QueueError> {
        let items = self.lock()?;
        Ok(items
            .iter()
            .filter(|item| !item.is_retryable())
            .cloned()
            .collect())
    }

    /// The server accepted the item; remove it.
    pub fn mark_resolved(
        &self,
        local_id: LocalSubmissionId,
    ) -> Result<PendingSubmission, QueueError> {
        self.remove_item(local_id)
    }

    /// Record one failed delivery attempt; the item stays queued.
    pub fn record_failure(
        &self,
        local_id: LocalSubmissionId,
        error: &str,
    ) -> Result<PendingSubmission, QueueError> {
        self.mutate_item(local_id, |item| item.record_failure(error, Utc::now()))
    }

    /// Park an item for manual review; it leaves the retry rotation but
    /// stays in the queue until acknowledged.
    pub fn mark_attention(
        &self,
        local_id: LocalSubmissionId,
        reason: AttentionReason,
        error: &str,
    ) -> Result<PendingSubmission, QueueError> {
        self.mutate_item(local_id, |item| {
            item.mark_attention(reason, error, Utc::now())
        })
    }

    /// Operator acknowledgment of a parked item; drops it from the queue.
    pub fn acknowledge(
        &self,
        local_id: LocalSubmissionId,
    ) -> Result<PendingSubmission, QueueError> {
        self.remove_item(local_id)
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.lock()?.is_empty())
    }

    /// Current depth counters.
    pub fn stats(&self) -> QueueStats {
        *self.stats_tx.borrow()
    }

    /// Watch channel that updates on every queue mutation.
    pub fn subscribe_stats(&self) -> watch::Receiver<QueueStats> {
        self.stats_tx.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<PendingSubmission>>, QueueError> {
        self.items.lock().map_err(|_| QueueError::LockPoisoned)
    }

    fn remove_item(
        &self,
        local_id: LocalSubmissionId,
    ) -> Result<PendingSubmission, QueueError> {
        let mut items = self.lock()?;
        let idx = position(&items, local_id)?;
        let removed = items.remove(idx);
        if let Err(e) = self.persist(&items) {
            items.insert(idx, removed);
            return Err(e);
        }
        self.publish_stats(&items);
        Ok(removed)
    }

    fn mutate_item(
        &self,
        local_id: LocalSubmissionId,
        mutate: impl FnOnce(&mut PendingSubmission),
    ) -> Result<PendingSubmission, QueueError> {
        let mut items = self.lock()?;
        let idx = position(&items, local_id)?;
        let saved = items[idx].clone();
        mutate(&mut items[idx]);
        if let Err(e) = self.persist(&items) {
            items[idx] = saved;
            return Err(e);
        }
        self.publish_stats(&items);
        Ok(items[idx].clone())
    }

    fn persist(&self, items: &[PendingSubmission]) -> Result<(), QueueError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = QueueFile {
            items: items.to_vec(),
        };
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn publish_stats(&self, items: &[PendingSubmission]) {
        self.stats_tx.send_replace(stats_of(items));
    }
}

fn position(
    items: &[PendingSubmission],
    local_id: LocalSubmissionId,
) -> Result<usize, QueueError> {
    items
        .iter()
        .position(|item| item.local_id == local_id)
        .ok_or(QueueError::UnknownItem {
            local_id: local_id.as_uuid(),
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use escruta_core::{PendingState, StationId, VoteTally};
    use tempfile::TempDir;

    fn submission(table_number: i32) -> ReportSubmission {
        ReportSubmission::new(
            StationId::now_v7(),
            table_number,
            VoteTally {
                votes_registered: 200,
                votes_candidate: 90,
                votes_blank: 6,
                votes_null: 3,
            },
        )
    }

    fn queue_in(dir: &TempDir, max_items: usize) -> OfflineQueue {
        OfflineQueue::open(dir.path().join("queue.json"), QueueConfig { max_items }).unwrap()
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 8);
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[test]
    fn items_survive_restart_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        let first;
        let second;
        {
            let queue = OfflineQueue::open(&path, QueueConfig::default()).unwrap();
            first = queue.enqueue(submission(1)).unwrap();
            second = queue.enqueue(submission(2)).unwrap();
        }
        let reopened = OfflineQueue::open(&path, QueueConfig::default()).unwrap();
        let pending = reopened.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].local_id, first);
        assert_eq!(pending[1].local_id, second);
        assert_eq!(reopened.stats().queued, 2);
    }

    #[test]
    fn quota_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 2);
        queue.enqueue(submission(1)).unwrap();
        queue.enqueue(submission(2)).unwrap();
        let err = queue.enqueue(submission(3)).unwrap_err();
        assert!(matches!(err, QueueError::QuotaExceeded { capacity: 2 }));
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn resolved_items_leave_queue_and_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        let queue = OfflineQueue::open(&path, QueueConfig::default()).unwrap();
        let id = queue.enqueue(submission(1)).unwrap();
        queue.mark_resolved(id).unwrap();
        assert!(queue.is_empty().unwrap());

        let reopened = OfflineQueue::open(&path, QueueConfig::default()).unwrap();
        assert!(reopened.is_empty().unwrap());
    }

    #[test]
    fn failure_bookkeeping_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        let queue = OfflineQueue::open(&path, QueueConfig::default()).unwrap();
        let id = queue.enqueue(submission(1)).unwrap();
        let updated = queue.record_failure(id, "connection refused").unwrap();
        assert_eq!(updated.retry_count, 1);
        assert_eq!(updated.last_error.as_deref(), Some("connection refused"));
        assert!(updated.is_retryable());

        let reopened = OfflineQueue::open(&path, QueueConfig::default()).unwrap();
        let pending = reopened.pending().unwrap();
        assert_eq!(pending[0].retry_count, 1);
    }

    #[test]
    fn parked_items_leave_the_retry_rotation() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 8);
        let id = queue.enqueue(submission(1)).unwrap();
        let parked = queue
            .mark_attention(id, AttentionReason::ConflictDivergent, "payload differs")
            .unwrap();
        assert_eq!(
            parked.state,
            PendingState::NeedsAttention(AttentionReason::ConflictDivergent)
        );
        assert!(queue.pending().unwrap().is_empty());
        let attention = queue.attention().unwrap();
        assert_eq!(attention.len(), 1);
        assert_eq!(attention[0].local_id, id);
        assert_eq!(queue.stats().needs_attention, 1);
    }

    #[test]
    fn acknowledged_items_are_dropped() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 8);
        let id = queue.enqueue(submission(1)).unwrap();
        queue
            .mark_attention(id, AttentionReason::Rejected, "not assigned")
            .unwrap();
        queue.acknowledge(id).unwrap();
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 8);
        let err = queue.mark_resolved(LocalSubmissionId::now_v7()).unwrap_err();
        assert!(matches!(err, QueueError::UnknownItem { .. }));
    }

    #[test]
    fn stats_watch_tracks_queue_movement() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 8);
        let rx = queue.subscribe_stats();

        let id = queue.enqueue(submission(1)).unwrap();
        assert_eq!(rx.borrow().queued, 1);

        queue
            .mark_attention(id, AttentionReason::RetryLimitReached, "gave up")
            .unwrap();
        assert_eq!(rx.borrow().queued, 0);
        assert_eq!(rx.borrow().needs_attention, 1);
    }

    #[test]
    fn corrupt_file_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(&path, "not json").unwrap();
        let err = OfflineQueue::open(&path, QueueConfig::default()).unwrap_err();
        assert!(matches!(err, QueueError::Serde(_)));
    }

    #[test]
    fn pending_is_fifo_by_creation() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir, 8);
        let ids: Vec<_> = (1..=3)
            .map(|n| queue.enqueue(submission(n)).unwrap())
            .collect();
        let pending = queue.pending().unwrap();
        let order: Vec<_> = pending.iter().map(|item| item.local_id).collect();
        assert_eq!(order, ids);
    }
}

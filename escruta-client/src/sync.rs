//! Sync Coordinator
//!
//! Drains the offline queue through a `GatewayTransport`, one pass at a
//! time per device. Transient failures back off exponentially per item;
//! server verdicts park the item for manual review. One item's failure
//! never stops a pass.

use crate::queue::OfflineQueue;
use crate::transport::{GatewayTransport, TransportError};
use chrono::Utc;
use escruta_core::{
    AttentionReason, EntityIdType, LocalSubmissionId, PendingSubmission, QueueError, SyncConfig,
    Timestamp,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// PASS OUTCOME
// ============================================================================

/// Tally of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Items the server accepted, including idempotent replays.
    pub submitted: usize,
    /// Items parked because the server holds a divergent report.
    pub conflicts: usize,
    /// Items parked on a terminal server verdict.
    pub rejected: usize,
    /// Items that failed without a verdict and stay queued.
    pub transient_failures: usize,
    /// Items skipped because their backoff delay has not elapsed.
    pub skipped_backoff: usize,
}

/// Result of one sync trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A pass ran to completion.
    Completed(SyncReport),
    /// Another pass held the device lock; this trigger was dropped.
    AlreadyRunning,
}

// ============================================================================
// SYNC COORDINATOR
// ============================================================================

/// Delivery loop for one field device.
pub struct SyncCoordinator {
    queue: Arc<OfflineQueue>,
    transport: Arc<dyn GatewayTransport>,
    config: SyncConfig,
    pass_lock: tokio::sync::Mutex<()>,
    connectivity: tokio::sync::Notify,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<OfflineQueue>,
        transport: Arc<dyn GatewayTransport>,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            config,
            pass_lock: tokio::sync::Mutex::new(()),
            connectivity: tokio::sync::Notify::new(),
        }
    }

    /// Wake the interval loop early, e.g. when connectivity returns.
    pub fn notify_connectivity(&self) {
        self.connectivity.notify_one();
    }

    /// Run one delivery pass over the eligible queued items, oldest first.
    /// An overlapping trigger collapses into `AlreadyRunning` instead of
    /// queueing behind the running pass.
    pub async fn run_once(&self) -> Result<SyncOutcome, QueueError> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            return Ok(SyncOutcome::AlreadyRunning);
        };
        let mut report = SyncReport::default();
        let now = Utc::now();
        for item in self.queue.pending()? {
            if !self.is_due(&item, now) {
                report.skipped_backoff += 1;
                continue;
            }
            self.deliver(&item, &mut report).await?;
        }
        if report != SyncReport::default() {
            info!(
                submitted = report.submitted,
                conflicts = report.conflicts,
                rejected = report.rejected,
                transient_failures = report.transient_failures,
                skipped_backoff = report.skipped_backoff,
                "Sync pass finished"
            );
        }
        Ok(SyncOutcome::Completed(report))
    }

    /// Start the periodic loop: a pass every `sync_interval_ms`, plus one
    /// whenever `notify_connectivity` fires. Runs until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let interval = std::time::Duration::from_millis(self.config.sync_interval_ms);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = self.connectivity.notified() => {
                        debug!("Connectivity regained; starting sync pass");
                    }
                }
                match self.run_once().await {
                    Ok(SyncOutcome::Completed(_)) => {}
                    Ok(SyncOutcome::AlreadyRunning) => {
                        debug!("Sync pass already in flight; trigger dropped");
                    }
                    Err(e) => {
                        warn!(error = %e, "Sync pass failed");
                    }
                }
            }
        })
    }

    async fn deliver(
        &self,
        item: &PendingSubmission,
        report: &mut SyncReport,
    ) -> Result<(), QueueError> {
        match self.transport.submit(&item.payload).await {
            Ok(receipt) => {
                self.queue.mark_resolved(item.local_id)?;
                report.submitted += 1;
                debug!(
                    local_id = %item.local_id,
                    report_id = %receipt.report.report_id,
                    newly_recorded = receipt.newly_recorded,
                    "Submission delivered"
                );
            }
            Err(err) if err.is_conflict() => {
                self.queue.mark_attention(
                    item.local_id,
                    AttentionReason::ConflictDivergent,
                    &err.to_string(),
                )?;
                report.conflicts += 1;
                warn!(
                    local_id = %item.local_id,
                    station = %item.payload.station_id,
                    table = item.payload.table_number,
                    "Server holds a divergent report; parked for review"
                );
            }
            Err(TransportError::Rejected { code, message }) => {
                self.queue.mark_attention(
                    item.local_id,
                    AttentionReason::Rejected,
                    &format!("{code}: {message}"),
                )?;
                report.rejected += 1;
                warn!(
                    local_id = %item.local_id,
                    code = %code,
                    "Submission rejected; parked for review"
                );
            }
            Err(TransportError::Transient { reason }) => {
                let updated = self.queue.record_failure(item.local_id, &reason)?;
                report.transient_failures += 1;
                if updated.retry_count > self.config.retry_ceiling as i32 {
                    self.queue.mark_attention(
                        item.local_id,
                        AttentionReason::RetryLimitReached,
                        &reason,
                    )?;
                    warn!(
                        local_id = %item.local_id,
                        retries = updated.retry_count,
                        "Retry ceiling exceeded; parked for review"
                    );
                } else {
                    debug!(
                        local_id = %item.local_id,
                        retries = updated.retry_count,
                        "Transient delivery failure; will retry"
                    );
                }
            }
        }
        Ok(())
    }

    fn is_due(&self, item: &PendingSubmission, now: Timestamp) -> bool {
        let Some(last_attempt) = item.last_attempt_at else {
            return true;
        };
        if item.retry_count == 0 {
            return true;
        }
        last_attempt + self.backoff_delay(item) <= now
    }

    /// Delay before the item's next attempt: exponential in the failure
    /// count, capped, plus jitter derived from the item id so a fleet of
    /// devices spreads its retries without a shared RNG.
    fn backoff_delay(&self, item: &PendingSubmission) -> chrono::Duration {
        let exponent = (item.retry_count - 1).max(0);
        let capped = (self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(exponent))
        .min(self.config.max_backoff_ms as f64);
        chrono::Duration::milliseconds(capped as i64 + jitter_ms(item.local_id, self.config.jitter_ms) as i64)
    }
}

fn jitter_ms(local_id: LocalSubmissionId, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return 0;
    }
    // The tail bytes of a v7 UUID are random; the head is the timestamp.
    let bytes = local_id.as_uuid().into_bytes();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&bytes[8..16]);
    u64::from_le_bytes(seed) % (jitter_ms + 1)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SubmitReceipt;
    use async_trait::async_trait;
    use escruta_api::ErrorCode;
    use escruta_core::{
        PendingState, QueueConfig, ReportSubmission, ReporterId, StationId, TableReport, VoteTally,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
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

    fn recorded(submission: &ReportSubmission) -> TableReport {
        TableReport::from_submission(submission, ReporterId::now_v7(), Utc::now())
    }

    enum Script {
        Accept,
        AcceptReplay,
        Conflict,
        Reject,
        Outage,
    }

    struct ScriptedTransport {
        script: StdMutex<VecDeque<Script>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn submit(
            &self,
            submission: &ReportSubmission,
        ) -> Result<SubmitReceipt, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Accept);
            match step {
                Script::Accept => Ok(SubmitReceipt {
                    report: recorded(submission),
                    newly_recorded: true,
                }),
                Script::AcceptReplay => Ok(SubmitReceipt {
                    report: recorded(submission),
                    newly_recorded: false,
                }),
                Script::Conflict => Err(TransportError::Rejected {
                    code: ErrorCode::AlreadyReported,
                    message: "Table already reported with a different payload".to_string(),
                }),
                Script::Reject => Err(TransportError::Rejected {
                    code: ErrorCode::NotAssigned,
                    message: "Reporter is not assigned to this table".to_string(),
                }),
                Script::Outage => Err(TransportError::Transient {
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    fn queue_in(dir: &TempDir) -> Arc<OfflineQueue> {
        Arc::new(
            OfflineQueue::open(dir.path().join("queue.json"), QueueConfig::default()).unwrap(),
        )
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            SyncOutcome::AlreadyRunning => panic!("pass did not run"),
        }
    }

    #[tokio::test]
    async fn queued_items_drain_in_one_pass() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        for n in 1..=3 {
            queue.enqueue(submission(n)).unwrap();
        }
        let transport = ScriptedTransport::new(vec![]);
        let coordinator =
            SyncCoordinator::new(queue.clone(), transport.clone(), SyncConfig::default());

        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.submitted, 3);
        assert!(queue.is_empty().unwrap());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn idempotent_replay_counts_as_delivered() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::AcceptReplay]);
        let coordinator =
            SyncCoordinator::new(queue.clone(), transport, SyncConfig::default());

        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.submitted, 1);
        assert!(queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn divergent_conflict_parks_and_stops_retrying() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Conflict]);
        let coordinator =
            SyncCoordinator::new(queue.clone(), transport.clone(), SyncConfig::default());

        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.conflicts, 1);
        let attention = queue.attention().unwrap();
        assert_eq!(
            attention[0].state,
            PendingState::NeedsAttention(AttentionReason::ConflictDivergent)
        );

        // Parked items are invisible to later passes.
        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report, SyncReport::default());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn server_verdicts_are_never_retried() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Reject]);
        let coordinator =
            SyncCoordinator::new(queue.clone(), transport.clone(), SyncConfig::default());

        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.rejected, 1);
        let attention = queue.attention().unwrap();
        assert_eq!(
            attention[0].state,
            PendingState::NeedsAttention(AttentionReason::Rejected)
        );
        assert!(attention[0].last_error.is_some());

        completed(coordinator.run_once().await.unwrap());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn backoff_defers_recent_failures() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Outage, Script::Outage]);
        let config = SyncConfig {
            initial_backoff_ms: 60_000,
            jitter_ms: 0,
            ..SyncConfig::default()
        };
        let coordinator = SyncCoordinator::new(queue.clone(), transport.clone(), config);

        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.transient_failures, 1);

        // The failure is a moment old; the 60s delay has not elapsed.
        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.skipped_backoff, 1);
        assert_eq!(report.transient_failures, 0);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn retry_ceiling_parks_the_item() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Outage, Script::Outage]);
        let config = SyncConfig {
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter_ms: 0,
            retry_ceiling: 1,
            ..SyncConfig::default()
        };
        let coordinator = SyncCoordinator::new(queue.clone(), transport, config);

        // First failure stays within the ceiling.
        completed(coordinator.run_once().await.unwrap());
        assert_eq!(queue.pending().unwrap().len(), 1);

        // The second failure exceeds it.
        completed(coordinator.run_once().await.unwrap());
        let attention = queue.attention().unwrap();
        assert_eq!(
            attention[0].state,
            PendingState::NeedsAttention(AttentionReason::RetryLimitReached)
        );
        assert_eq!(attention[0].retry_count, 2);
    }

    #[tokio::test]
    async fn one_bad_item_never_stops_the_pass() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        queue.enqueue(submission(2)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Outage, Script::Accept]);
        let coordinator =
            SyncCoordinator::new(queue.clone(), transport, SyncConfig::default());

        let report = completed(coordinator.run_once().await.unwrap());
        assert_eq!(report.transient_failures, 1);
        assert_eq!(report.submitted, 1);
        assert_eq!(queue.pending().unwrap().len(), 1);
    }

    struct BlockingTransport {
        entered: StdMutex<Option<tokio::sync::oneshot::Sender<()>>>,
        release: StdMutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl GatewayTransport for BlockingTransport {
        async fn submit(
            &self,
            submission: &ReportSubmission,
        ) -> Result<SubmitReceipt, TransportError> {
            if let Some(tx) = self.entered.lock().unwrap().take() {
                let _ = tx.send(());
            }
            let rx = self.release.lock().unwrap().take();
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok(SubmitReceipt {
                report: recorded(submission),
                newly_recorded: true,
            })
        }
    }

    #[tokio::test]
    async fn overlapping_passes_collapse() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();

        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        let transport = Arc::new(BlockingTransport {
            entered: StdMutex::new(Some(entered_tx)),
            release: StdMutex::new(Some(release_rx)),
        });
        let coordinator = Arc::new(SyncCoordinator::new(
            queue.clone(),
            transport,
            SyncConfig::default(),
        ));

        let background = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_once().await })
        };
        entered_rx.await.unwrap();

        let outcome = coordinator.run_once().await.unwrap();
        assert_eq!(outcome, SyncOutcome::AlreadyRunning);

        release_tx.send(()).unwrap();
        let report = completed(background.await.unwrap().unwrap());
        assert_eq!(report.submitted, 1);
        assert!(queue.is_empty().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_drains_on_the_interval() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Accept]);
        let coordinator = Arc::new(SyncCoordinator::new(
            queue.clone(),
            transport,
            SyncConfig::default(),
        ));

        let handle = coordinator.spawn();
        for _ in 0..60 {
            if queue.is_empty().unwrap() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1_000)).await;
        }
        assert!(queue.is_empty().unwrap());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_wakes_the_loop_early() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue(submission(1)).unwrap();
        let transport = ScriptedTransport::new(vec![Script::Accept]);
        let config = SyncConfig {
            sync_interval_ms: 3_600_000,
            ..SyncConfig::default()
        };
        let coordinator = Arc::new(SyncCoordinator::new(queue.clone(), transport, config));

        let handle = coordinator.clone().spawn();
        tokio::task::yield_now().await;
        coordinator.notify_connectivity();

        // Far less virtual time passes than the hour-long interval, so only
        // the connectivity notification can have triggered the pass.
        for _ in 0..50 {
            if queue.is_empty().unwrap() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(queue.is_empty().unwrap());
        handle.abort();
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = SyncConfig {
            initial_backoff_ms: 2_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
            jitter_ms: 0,
            ..SyncConfig::default()
        };
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        let transport = ScriptedTransport::new(vec![]);
        let coordinator = SyncCoordinator::new(queue, transport, config);

        let mut item = PendingSubmission::new(submission(1), Utc::now());
        let expect = [(1, 2_000), (2, 4_000), (3, 8_000), (4, 10_000), (10, 10_000)];
        for (retry_count, delay_ms) in expect {
            item.retry_count = retry_count;
            assert_eq!(
                coordinator.backoff_delay(&item),
                chrono::Duration::milliseconds(delay_ms)
            );
        }
    }

    #[test]
    fn fresh_items_are_due_immediately() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        let transport = ScriptedTransport::new(vec![]);
        let coordinator = SyncCoordinator::new(queue, transport, SyncConfig::default());

        let item = PendingSubmission::new(submission(1), Utc::now());
        assert!(coordinator.is_due(&item, Utc::now()));
    }

    #[test]
    fn jitter_is_bounded_and_stable() {
        let id = LocalSubmissionId::now_v7();
        let first = jitter_ms(id, 500);
        assert!(first <= 500);
        assert_eq!(first, jitter_ms(id, 500));
        assert_eq!(jitter_ms(id, 0), 0);
    }
}

//! Concurrent transfer session management
//!
//! Every upload/download is tracked as a [`TransferSession`]. Admission control
//! is a single serialization point: one mutex guards the session table, and a
//! request that would exceed `max_concurrent_transfers` is rejected rather
//! than queued, so callers own their retry policy. Cancellation flips a
//! [`CancellationToken`] that the I/O loop observes at chunk boundaries.

use lanlink_core::{
    emit, EventSender, LanlinkResult, NetworkConfig, NetworkEvent, TimeSource, TransferDirection,
    TransferError, TransferId, TransferSession, TransferState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Transfer Session Manager
// ----------------------------------------------------------------------------

/// Tracks concurrent transfers and enforces the concurrency limit
pub struct TransferSessionManager {
    inner: Arc<TransferInner>,
}

struct TransferInner {
    events: EventSender,
    time: Arc<dyn TimeSource>,
    table: Mutex<TransferTable>,
}

struct TransferTable {
    sessions: HashMap<TransferId, TransferSession>,
    tokens: HashMap<TransferId, CancellationToken>,
    max_concurrent: usize,
    completed: u64,
    failed: u64,
    cancelled: u64,
}

impl TransferSessionManager {
    pub fn new(events: EventSender, time: Arc<dyn TimeSource>, config: &NetworkConfig) -> Self {
        Self {
            inner: Arc::new(TransferInner {
                events,
                time,
                table: Mutex::new(TransferTable {
                    sessions: HashMap::new(),
                    tokens: HashMap::new(),
                    max_concurrent: config.max_concurrent_transfers,
                    completed: 0,
                    failed: 0,
                    cancelled: 0,
                }),
            }),
        }
    }

    /// Adopt a replaced configuration. Sessions already admitted keep running
    /// even if the new limit is lower; only new admissions see it.
    pub fn apply_config(&self, config: &NetworkConfig) {
        let mut table = self.inner.table.lock().expect("transfer table poisoned");
        table.max_concurrent = config.max_concurrent_transfers;
    }

    /// Admit a new transfer, or reject it when the limit is reached.
    pub fn begin(
        &self,
        direction: TransferDirection,
        file_name: impl Into<String>,
        total_bytes: u64,
    ) -> LanlinkResult<TransferHandle> {
        let file_name = file_name.into();
        let mut table = self.inner.table.lock().expect("transfer table poisoned");

        let active = table.sessions.len();
        if active >= table.max_concurrent {
            let err = TransferError::ConcurrencyLimit {
                active,
                max: table.max_concurrent,
            };
            emit(
                &self.inner.events,
                NetworkEvent::Error {
                    message: err.to_string(),
                },
            );
            return Err(err.into());
        }

        let id = TransferId::generate();
        let session = TransferSession::new(
            id,
            direction,
            file_name,
            total_bytes,
            self.inner.time.now(),
        );
        let token = CancellationToken::new();

        debug!(%id, %direction, total_bytes, "transfer admitted");
        table.sessions.insert(id, session);
        table.tokens.insert(id, token.clone());

        Ok(TransferHandle {
            id,
            token,
            inner: Arc::clone(&self.inner),
            finished: AtomicBool::new(false),
        })
    }

    /// Cancel a tracked transfer.
    ///
    /// Unknown ids fail without emitting an event. A successful cancel frees
    /// the concurrency slot immediately; the in-flight I/O loop notices the
    /// token at its next chunk boundary and stops.
    pub fn cancel(&self, id: TransferId) -> LanlinkResult<()> {
        let mut table = self.inner.table.lock().expect("transfer table poisoned");

        let token = table
            .tokens
            .remove(&id)
            .ok_or(TransferError::UnknownSession { id })?;
        token.cancel();

        if table.sessions.remove(&id).is_some() {
            table.cancelled += 1;
            debug!(%id, "transfer cancelled");
        }
        Ok(())
    }

    /// Number of currently active sessions
    pub fn active_count(&self) -> usize {
        self.inner
            .table
            .lock()
            .expect("transfer table poisoned")
            .sessions
            .len()
    }

    /// Defensive copy of the active sessions
    pub fn sessions(&self) -> Vec<TransferSession> {
        self.inner
            .table
            .lock()
            .expect("transfer table poisoned")
            .sessions
            .values()
            .cloned()
            .collect()
    }

    /// Sum of instantaneous throughput across active sessions
    pub fn aggregate_throughput_bps(&self) -> f64 {
        self.inner
            .table
            .lock()
            .expect("transfer table poisoned")
            .sessions
            .values()
            .map(|s| s.speed_bps)
            .sum()
    }

    /// Terminal-state counters: (completed, failed, cancelled)
    pub fn terminal_counts(&self) -> (u64, u64, u64) {
        let table = self.inner.table.lock().expect("transfer table poisoned");
        (table.completed, table.failed, table.cancelled)
    }
}

impl TransferInner {
    fn record_progress(&self, id: TransferId, transferred_bytes: u64) {
        let now = self.time.now();
        let mut table = self.table.lock().expect("transfer table poisoned");
        if let Some(session) = table.sessions.get_mut(&id) {
            session.record_progress(transferred_bytes, now);
        }
    }

    fn finish(&self, id: TransferId, state: TransferState, reason: Option<&str>) {
        let mut table = self.table.lock().expect("transfer table poisoned");

        // Already removed by a concurrent cancel; the slot is free.
        if table.sessions.remove(&id).is_none() {
            return;
        }
        table.tokens.remove(&id);

        match state {
            TransferState::Completed => table.completed += 1,
            TransferState::Cancelled => table.cancelled += 1,
            _ => {
                table.failed += 1;
                let message = reason.unwrap_or("transfer failed");
                warn!(%id, message, "transfer failed");
                emit(
                    &self.events,
                    NetworkEvent::Error {
                        message: format!("Transfer {id} failed: {message}"),
                    },
                );
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Transfer Handle
// ----------------------------------------------------------------------------

/// Borrowed capability to drive one admitted transfer.
///
/// Dropping the handle without calling [`complete`](Self::complete) counts the
/// transfer as failed, so an aborted connection can never leak its slot.
pub struct TransferHandle {
    id: TransferId,
    token: CancellationToken,
    inner: Arc<TransferInner>,
    finished: AtomicBool,
}

impl TransferHandle {
    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Token the I/O loop must check at every chunk boundary
    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Push cumulative progress from the I/O loop
    pub fn record_progress(&self, transferred_bytes: u64) {
        self.inner.record_progress(self.id, transferred_bytes);
    }

    /// Mark the transfer completed and free its slot
    pub fn complete(self) {
        self.finished.store(true, Ordering::SeqCst);
        self.inner.finish(self.id, TransferState::Completed, None);
    }

    /// Mark the transfer failed and free its slot
    pub fn fail(self, reason: &str) {
        self.finished.store(true, Ordering::SeqCst);
        self.inner
            .finish(self.id, TransferState::Failed, Some(reason));
    }

    /// Mark the transfer cancelled (observed mid-stream) and free its slot
    pub fn acknowledge_cancelled(self) {
        self.finished.store(true, Ordering::SeqCst);
        self.inner.finish(self.id, TransferState::Cancelled, None);
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferHandle")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            self.inner
                .finish(self.id, TransferState::Failed, Some("connection dropped"));
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lanlink_core::{create_event_channel, ChannelConfig, ManualTimeSource, Timestamp};

    fn manager(max: usize) -> (TransferSessionManager, lanlink_core::EventReceiver) {
        let (events, receiver) = create_event_channel(&ChannelConfig::default());
        let config = NetworkConfig {
            max_concurrent_transfers: max,
            ..NetworkConfig::default()
        };
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        (TransferSessionManager::new(events, time, &config), receiver)
    }

    #[test]
    fn test_admission_rejects_over_limit() {
        let (manager, mut events) = manager(2);

        let _a = manager
            .begin(TransferDirection::Download, "a.bin", 10)
            .unwrap();
        let _b = manager
            .begin(TransferDirection::Download, "b.bin", 10)
            .unwrap();

        let err = manager
            .begin(TransferDirection::Download, "c.bin", 10)
            .unwrap_err();
        assert!(matches!(
            err,
            lanlink_core::LanlinkError::Transfer(TransferError::ConcurrencyLimit {
                active: 2,
                max: 2
            })
        ));
        assert_eq!(manager.active_count(), 2);

        // Rejection surfaces on the event channel too.
        assert!(matches!(
            events.try_recv().unwrap(),
            NetworkEvent::Error { .. }
        ));
    }

    #[test]
    fn test_slot_freed_on_completion() {
        let (manager, _events) = manager(1);

        let handle = manager
            .begin(TransferDirection::Upload, "a.bin", 10)
            .unwrap();
        assert!(manager
            .begin(TransferDirection::Upload, "b.bin", 10)
            .is_err());

        handle.complete();
        assert_eq!(manager.active_count(), 0);
        assert!(manager
            .begin(TransferDirection::Upload, "b.bin", 10)
            .is_ok());
        assert_eq!(manager.terminal_counts(), (1, 0, 0));
    }

    #[test]
    fn test_cancel_unknown_session_is_silent_failure() {
        let (manager, mut events) = manager(1);

        let err = manager.cancel(TransferId::generate()).unwrap_err();
        assert!(matches!(
            err,
            lanlink_core::LanlinkError::Transfer(TransferError::UnknownSession { .. })
        ));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_cancel_trips_token_and_frees_slot() {
        let (manager, _events) = manager(1);

        let handle = manager
            .begin(TransferDirection::Download, "a.bin", 10)
            .unwrap();
        let token = handle.cancellation();

        manager.cancel(handle.id()).unwrap();
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
        assert_eq!(manager.active_count(), 0);

        // The I/O loop acknowledging afterwards must not double-count.
        handle.acknowledge_cancelled();
        assert_eq!(manager.terminal_counts(), (0, 0, 1));
    }

    #[test]
    fn test_dropped_handle_counts_as_failed() {
        let (manager, _events) = manager(1);

        {
            let _handle = manager
                .begin(TransferDirection::Download, "a.bin", 10)
                .unwrap();
        }
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.terminal_counts(), (0, 1, 0));
    }

    #[test]
    fn test_lower_limit_applies_to_new_admissions_only() {
        let (manager, _events) = manager(2);

        let _a = manager
            .begin(TransferDirection::Download, "a.bin", 10)
            .unwrap();
        let _b = manager
            .begin(TransferDirection::Download, "b.bin", 10)
            .unwrap();

        manager.apply_config(&NetworkConfig {
            max_concurrent_transfers: 1,
            ..NetworkConfig::default()
        });

        // Existing sessions keep running; a new one is over the new limit.
        assert_eq!(manager.active_count(), 2);
        assert!(manager
            .begin(TransferDirection::Download, "c.bin", 10)
            .is_err());
    }

    #[test]
    fn test_progress_updates_speed() {
        let (events, _r) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let manager = TransferSessionManager::new(
            events,
            Arc::clone(&time) as Arc<dyn TimeSource>,
            &NetworkConfig::default(),
        );

        let handle = manager
            .begin(TransferDirection::Download, "a.bin", 1_000)
            .unwrap();
        time.advance(core::time::Duration::from_secs(2));
        handle.record_progress(500);

        let sessions = manager.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].transferred_bytes, 500);
        assert_eq!(sessions[0].speed_bps, 250.0);
        assert!(manager.aggregate_throughput_bps() > 0.0);
        handle.complete();
    }
}

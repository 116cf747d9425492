//! Tracked transfer sessions

use crate::types::{Timestamp, TransferId};
use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Direction and State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "upload"),
            TransferDirection::Download => write!(f, "download"),
        }
    }
}

/// Lifecycle state of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl TransferState {
    /// Terminal states free the session's concurrency slot
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Cancelled
        )
    }
}

// ----------------------------------------------------------------------------
// Transfer Session
// ----------------------------------------------------------------------------

/// The tracked lifecycle of one file upload or download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSession {
    pub id: TransferId,
    pub direction: TransferDirection,
    pub file_name: String,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub state: TransferState,
    /// Instantaneous throughput in bytes per second
    pub speed_bps: f64,
    pub started_at: Timestamp,
}

impl TransferSession {
    /// Create a new active session
    pub fn new(
        id: TransferId,
        direction: TransferDirection,
        file_name: impl Into<String>,
        total_bytes: u64,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id,
            direction,
            file_name: file_name.into(),
            total_bytes,
            transferred_bytes: 0,
            state: TransferState::Active,
            speed_bps: 0.0,
            started_at,
        }
    }

    /// Record progress, deriving throughput from elapsed wall time
    pub fn record_progress(&mut self, transferred_bytes: u64, now: Timestamp) {
        self.transferred_bytes = transferred_bytes;
        let elapsed = now.duration_since(self.started_at).as_secs_f64();
        if elapsed > 0.0 {
            self.speed_bps = transferred_bytes as f64 / elapsed;
        }
    }

    /// Fraction complete in `[0.0, 1.0]`, zero for unknown totals
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.transferred_bytes as f64 / self.total_bytes as f64).min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TransferState::Pending.is_terminal());
        assert!(!TransferState::Active.is_terminal());
        assert!(TransferState::Completed.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(TransferState::Cancelled.is_terminal());
    }

    #[test]
    fn test_progress_and_speed() {
        let mut session = TransferSession::new(
            TransferId::generate(),
            TransferDirection::Download,
            "report.pdf",
            1_000,
            Timestamp::new(0),
        );

        session.record_progress(500, Timestamp::new(2_000));
        assert_eq!(session.progress(), 0.5);
        assert_eq!(session.speed_bps, 250.0);
    }

    #[test]
    fn test_progress_clamps_past_total() {
        let mut session = TransferSession::new(
            TransferId::generate(),
            TransferDirection::Upload,
            "notes.txt",
            100,
            Timestamp::new(0),
        );
        session.record_progress(150, Timestamp::new(1_000));
        assert_eq!(session.progress(), 1.0);
    }
}

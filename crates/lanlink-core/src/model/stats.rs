//! Aggregated statistics and the periodic performance snapshot

use crate::model::connectivity::ConnectivitySnapshot;
use crate::model::transfer::TransferSession;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Performance Snapshot
// ----------------------------------------------------------------------------

/// Point-in-time counts and rates, rebuilt on every monitoring tick.
///
/// Not persisted; the previous snapshot is simply replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub taken_at: Timestamp,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub active_transfers: usize,
    pub devices_online: usize,
    /// Sum of instantaneous throughput across active transfers
    pub aggregate_throughput_bps: f64,
}

impl Default for PerformanceSnapshot {
    fn default() -> Self {
        Self {
            taken_at: Timestamp::new(0),
            cpu_percent: 0.0,
            memory_bytes: 0,
            active_transfers: 0,
            devices_online: 0,
            aggregate_throughput_bps: 0.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Network Statistics
// ----------------------------------------------------------------------------

/// Synchronous aggregation of every component's state, for diagnostics/export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub initialized: bool,
    pub connectivity: ConnectivitySnapshot,
    pub available_network_count: usize,
    pub saved_network_count: usize,
    pub discovery_running: bool,
    pub discovered_device_count: usize,
    pub sharing_server_running: bool,
    pub shared_file_count: usize,
    pub hotspot_enabled: bool,
    pub transfers: Vec<TransferSession>,
    pub performance: PerformanceSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_serialize_to_json() {
        let stats = NetworkStatistics {
            initialized: true,
            connectivity: ConnectivitySnapshot::default(),
            available_network_count: 2,
            saved_network_count: 1,
            discovery_running: false,
            discovered_device_count: 0,
            sharing_server_running: false,
            shared_file_count: 0,
            hotspot_enabled: false,
            transfers: Vec::new(),
            performance: PerformanceSnapshot::default(),
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"available_network_count\":2"));
    }
}

//! Platform capability interfaces
//!
//! The engine never talks to the OS directly. Every platform-dependent
//! operation (Wi-Fi scan/join, access-point control, connectivity change
//! notifications, the peer-discovery protocol, permission prompts, machine
//! metrics) sits behind one of these narrow traits, so the coordination logic
//! stays deterministic and testable with fakes.
//!
//! Long-running sources follow the task shape used throughout the engine:
//! `run(sender, shutdown)` is spawned by the owning manager, pushes
//! notifications until the token is cancelled, and owns its own cleanup.

use crate::config::HotspotConfig;
use crate::errors::LanlinkResult;
use crate::model::connectivity::ConnectivityChange;
use crate::model::device::DiscoveredDevice;
use crate::model::wifi::WifiNetwork;
use async_trait::async_trait;
use core::fmt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ----------------------------------------------------------------------------
// Permissions
// ----------------------------------------------------------------------------

/// OS permissions the engine depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Required for Wi-Fi scan results on mobile platforms
    Location,
    /// Required for LAN discovery broadcasts
    LocalNetwork,
    /// Required to read files registered for sharing
    Storage,
}

impl Permission {
    /// Every permission the engine may request during initialization
    pub const ALL: [Permission; 3] = [
        Permission::Location,
        Permission::LocalNetwork,
        Permission::Storage,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Location => write!(f, "location"),
            Permission::LocalNetwork => write!(f, "local-network"),
            Permission::Storage => write!(f, "storage"),
        }
    }
}

/// Permission-request primitive
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Request one permission, returning whether it was granted
    async fn request(&self, permission: Permission) -> bool;
}

// ----------------------------------------------------------------------------
// Wi-Fi
// ----------------------------------------------------------------------------

/// OS Wi-Fi scan and join primitives
#[async_trait]
pub trait WifiPlatform: Send + Sync {
    /// Kick off an asynchronous scan; results are read after a settle interval
    async fn trigger_scan(&self) -> LanlinkResult<()>;

    /// Read the most recent scan results
    async fn scan_results(&self) -> LanlinkResult<Vec<WifiNetwork>>;

    /// Join the given network
    async fn join(&self, network: &WifiNetwork, password: Option<&str>) -> LanlinkResult<()>;

    /// Leave the current network
    async fn leave(&self) -> LanlinkResult<()>;
}

/// Device-hosted access point primitives
#[async_trait]
pub trait HotspotPlatform: Send + Sync {
    async fn start_access_point(&self, config: &HotspotConfig) -> LanlinkResult<()>;

    async fn stop_access_point(&self) -> LanlinkResult<()>;
}

// ----------------------------------------------------------------------------
// Connectivity Notifications
// ----------------------------------------------------------------------------

/// OS connectivity-change source.
///
/// Pushes one [`ConnectivityChange`] per OS notification, in delivery order,
/// until the shutdown token is cancelled.
#[async_trait]
pub trait ConnectivitySource: Send + 'static {
    async fn run(
        &mut self,
        changes: mpsc::Sender<ConnectivityChange>,
        shutdown: CancellationToken,
    ) -> LanlinkResult<()>;
}

// ----------------------------------------------------------------------------
// Discovery Protocol
// ----------------------------------------------------------------------------

/// Underlying LAN peer-discovery protocol.
///
/// The wire format (multicast/broadcast beacon framing) is the protocol's
/// concern; the engine only consumes full device batches. Each batch must be
/// the complete set of currently visible devices; the registry is replaced,
/// not merged.
#[async_trait]
pub trait DiscoveryProtocol: Send + 'static {
    async fn run(
        &mut self,
        batches: mpsc::Sender<Vec<DiscoveredDevice>>,
        shutdown: CancellationToken,
    ) -> LanlinkResult<()>;
}

// ----------------------------------------------------------------------------
// Machine Metrics
// ----------------------------------------------------------------------------

/// Provider of host machine metrics for performance snapshots
pub trait MetricsProvider: Send + Sync {
    fn cpu_percent(&self) -> f32;

    fn memory_bytes(&self) -> u64;
}

/// Metrics provider reporting nothing, for hosts without a metrics source
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsProvider;

impl MetricsProvider for NoopMetricsProvider {
    fn cpu_percent(&self) -> f32 {
        0.0
    }

    fn memory_bytes(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_display() {
        assert_eq!(Permission::Location.to_string(), "location");
        assert_eq!(Permission::LocalNetwork.to_string(), "local-network");
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoopMetricsProvider;
        assert_eq!(metrics.cpu_percent(), 0.0);
        assert_eq!(metrics.memory_bytes(), 0);
    }
}

//! Connectivity state as observed from the OS

use crate::types::Bssid;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ----------------------------------------------------------------------------
// Connectivity Kind
// ----------------------------------------------------------------------------

/// Kind of the currently active network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityKind {
    Wifi,
    Ethernet,
    Cellular,
    Offline,
}

impl fmt::Display for ConnectivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityKind::Wifi => write!(f, "wifi"),
            ConnectivityKind::Ethernet => write!(f, "ethernet"),
            ConnectivityKind::Cellular => write!(f, "cellular"),
            ConnectivityKind::Offline => write!(f, "offline"),
        }
    }
}

// ----------------------------------------------------------------------------
// Change Notifications
// ----------------------------------------------------------------------------

/// One OS connectivity-change notification, as delivered by the platform.
///
/// The monitor resolves the local address itself; the source only reports what
/// the OS knows about the active interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityChange {
    pub kind: ConnectivityKind,
    pub ssid: Option<String>,
    pub bssid: Option<Bssid>,
    pub signal_strength: Option<i16>,
}

impl ConnectivityChange {
    /// Notification for a lost connection
    pub fn offline() -> Self {
        Self {
            kind: ConnectivityKind::Offline,
            ssid: None,
            bssid: None,
            signal_strength: None,
        }
    }

    /// Notification for an active Wi-Fi association
    pub fn wifi(ssid: impl Into<String>, bssid: Bssid, signal_strength: i16) -> Self {
        Self {
            kind: ConnectivityKind::Wifi,
            ssid: Some(ssid.into()),
            bssid: Some(bssid),
            signal_strength: Some(signal_strength),
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Synchronous view of current connectivity, readable without blocking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub kind: ConnectivityKind,
    pub ssid: Option<String>,
    pub bssid: Option<Bssid>,
    pub signal_strength: Option<i16>,
    /// Best-effort local IPv4: first non-loopback, non-link-local address
    pub local_ip: Option<IpAddr>,
}

impl ConnectivitySnapshot {
    pub fn is_connected(&self) -> bool {
        self.kind != ConnectivityKind::Offline
    }

    pub fn is_wifi(&self) -> bool {
        self.kind == ConnectivityKind::Wifi
    }
}

impl Default for ConnectivitySnapshot {
    fn default() -> Self {
        Self {
            kind: ConnectivityKind::Offline,
            ssid: None,
            bssid: None,
            signal_strength: None,
            local_ip: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_offline() {
        let snapshot = ConnectivitySnapshot::default();
        assert!(!snapshot.is_connected());
        assert!(snapshot.local_ip.is_none());
    }

    #[test]
    fn test_wifi_change_carries_identity() {
        let change = ConnectivityChange::wifi("HomeWifi", Bssid::new([0; 6]), -40);
        assert_eq!(change.kind, ConnectivityKind::Wifi);
        assert_eq!(change.ssid.as_deref(), Some("HomeWifi"));
        assert_eq!(change.signal_strength, Some(-40));
    }
}

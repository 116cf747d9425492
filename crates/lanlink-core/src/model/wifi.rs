//! Wi-Fi scan results and the saved-network registry entries

use crate::types::{Bssid, Timestamp};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Scan Results
// ----------------------------------------------------------------------------

/// One access point observed during a scan (ephemeral, replaced per scan)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    pub bssid: Bssid,
    /// Received signal strength in dBm (closer to zero is stronger)
    pub signal_strength: i16,
    /// Channel frequency in MHz
    pub frequency: u32,
    /// Raw capability string as reported by the platform
    pub capabilities: String,
    /// Derived from the capability tokens, see [`is_secure_capability`]
    pub is_secure: bool,
}

impl WifiNetwork {
    /// Build a scan result, deriving the security flag from the capabilities
    pub fn new(
        ssid: impl Into<String>,
        bssid: Bssid,
        signal_strength: i16,
        frequency: u32,
        capabilities: impl Into<String>,
    ) -> Self {
        let capabilities = capabilities.into();
        let is_secure = is_secure_capability(&capabilities);
        Self {
            ssid: ssid.into(),
            bssid,
            signal_strength,
            frequency,
            capabilities,
            is_secure,
        }
    }
}

/// Classify a platform capability string as secured or open.
///
/// Capability strings look like `[WPA2-PSK-CCMP][ESS]`; any recognized
/// encryption token marks the network as secured.
pub fn is_secure_capability(capabilities: &str) -> bool {
    const SECURITY_TOKENS: [&str; 5] = ["WPA", "WEP", "PSK", "EAP", "SAE"];
    let upper = capabilities.to_ascii_uppercase();
    SECURITY_TOKENS.iter().any(|token| upper.contains(token))
}

// ----------------------------------------------------------------------------
// Saved Networks
// ----------------------------------------------------------------------------

/// One persisted known network, unique per BSSID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNetwork {
    pub ssid: String,
    pub bssid: Bssid,
    /// Present only for secured networks; persisted encrypted at rest
    pub password: Option<String>,
    pub is_secure: bool,
    pub last_connected: Timestamp,
    pub connection_count: u32,
}

impl SavedNetwork {
    /// Create a first-connect entry from a scan result
    pub fn from_network(network: &WifiNetwork, password: Option<String>, now: Timestamp) -> Self {
        Self {
            ssid: network.ssid.clone(),
            bssid: network.bssid,
            password,
            is_secure: network.is_secure,
            last_connected: now,
            connection_count: 1,
        }
    }

    /// Record another successful connection
    pub fn record_reconnect(&mut self, password: Option<String>, now: Timestamp) {
        self.connection_count += 1;
        self.last_connected = now;
        if password.is_some() {
            self.password = password;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Discovered LAN devices

use crate::types::{DeviceId, Timestamp};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

// ----------------------------------------------------------------------------
// Device Type
// ----------------------------------------------------------------------------

/// Coarse category a device advertises about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Tablet,
    Server,
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Mobile => write!(f, "mobile"),
            DeviceType::Desktop => write!(f, "desktop"),
            DeviceType::Tablet => write!(f, "tablet"),
            DeviceType::Server => write!(f, "server"),
            DeviceType::Unknown => write!(f, "unknown"),
        }
    }
}

impl DeviceType {
    /// Parse the advertised type token, defaulting to `Unknown`
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "mobile" | "phone" => DeviceType::Mobile,
            "desktop" | "pc" => DeviceType::Desktop,
            "tablet" => DeviceType::Tablet,
            "server" => DeviceType::Server,
            _ => DeviceType::Unknown,
        }
    }
}

// ----------------------------------------------------------------------------
// Discovered Device
// ----------------------------------------------------------------------------

/// One device currently visible on the local network.
///
/// Owned exclusively by the discovery service; batches from the underlying
/// protocol replace the registry wholesale and the prune sweep evicts entries
/// whose `last_seen` exceeds the staleness threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub name: String,
    pub ip_address: IpAddr,
    pub device_type: DeviceType,
    pub last_seen: Timestamp,
    pub is_online: bool,
    pub metadata: HashMap<String, String>,
}

impl DiscoveredDevice {
    /// Whether this entry is older than the staleness threshold
    pub fn is_stale(&self, now: Timestamp, threshold: core::time::Duration) -> bool {
        now.duration_since(self.last_seen) > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn device(last_seen: Timestamp) -> DiscoveredDevice {
        DiscoveredDevice {
            id: DeviceId::new("device-1"),
            name: "Test Laptop".to_string(),
            ip_address: "192.168.1.20".parse().unwrap(),
            device_type: DeviceType::Desktop,
            last_seen,
            is_online: true,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_staleness_threshold() {
        let threshold = Duration::from_secs(300);
        let d = device(Timestamp::new(0));

        assert!(!d.is_stale(Timestamp::new(300_000), threshold));
        assert!(d.is_stale(Timestamp::new(300_001), threshold));
    }

    #[test]
    fn test_device_type_tokens() {
        assert_eq!(DeviceType::from_token("Mobile"), DeviceType::Mobile);
        assert_eq!(DeviceType::from_token("pc"), DeviceType::Desktop);
        assert_eq!(DeviceType::from_token("fridge"), DeviceType::Unknown);
    }
}

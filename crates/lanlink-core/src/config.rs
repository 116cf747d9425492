//! Centralized configuration for the lanlink engine
//!
//! All tunables live here: the externally supplied `NetworkConfig` and
//! `HotspotConfig`, the internal timing/buffer configs, and the master
//! `LanlinkConfig` that aggregates them. Configs are immutable values replaced
//! wholesale by `update_config`.

use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Network Configuration
// ----------------------------------------------------------------------------

/// User-facing configuration for discovery, sharing and transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port the sharing server binds when none is passed explicitly
    pub default_port: u16,
    /// Start device discovery automatically on initialization
    pub enable_auto_discovery: bool,
    /// Generate QR codes for share links by default
    pub enable_qr_code: bool,
    /// Require passwords on share links by default
    pub enable_password_protection: bool,
    /// Default lifetime of a share link without an explicit expiry
    pub session_timeout: Duration,
    /// Maximum number of simultaneously active transfer sessions
    pub max_concurrent_transfers: usize,
    /// Maximum size of a single shared file in bytes
    pub max_file_size: u64,
    /// Overall time limit for one Wi-Fi scan (trigger + settle + read)
    pub scan_timeout: Duration,
    /// Maximum number of persisted saved networks
    pub max_saved_networks: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_port: 8080,
            enable_auto_discovery: true,
            enable_qr_code: true,
            enable_password_protection: false,
            session_timeout: Duration::from_secs(3600), // 1 hour share links
            max_concurrent_transfers: 3,
            max_file_size: 100 * 1024 * 1024, // 100 MB
            scan_timeout: Duration::from_secs(10),
            max_saved_networks: 50,
        }
    }
}

// ----------------------------------------------------------------------------
// Hotspot Configuration
// ----------------------------------------------------------------------------

/// Wi-Fi security mode of an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityKind {
    Open,
    Wep,
    Wpa,
    Wpa2,
    Wpa3,
}

impl fmt::Display for SecurityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityKind::Open => write!(f, "open"),
            SecurityKind::Wep => write!(f, "wep"),
            SecurityKind::Wpa => write!(f, "wpa"),
            SecurityKind::Wpa2 => write!(f, "wpa2"),
            SecurityKind::Wpa3 => write!(f, "wpa3"),
        }
    }
}

/// Configuration for the device-hosted access point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotConfig {
    pub ssid: String,
    pub password: String,
    pub security: SecurityKind,
    pub max_clients: u32,
    /// Access point auto-off after this idle duration (enforced by platform)
    pub timeout: Duration,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            ssid: "lanlink".to_string(),
            password: String::new(),
            security: SecurityKind::Open,
            max_clients: 8,
            timeout: Duration::from_secs(600),
        }
    }
}

impl HotspotConfig {
    /// Check the config is usable for starting an access point.
    ///
    /// Checked at enable time rather than in [`LanlinkConfig::validate`] so a
    /// default config (open hotspot, no password) stays valid at startup.
    pub fn validate(&self) -> core::result::Result<(), String> {
        if self.ssid.is_empty() {
            return Err("Hotspot SSID cannot be empty".into());
        }
        if self.security != SecurityKind::Open && self.password.len() < 8 {
            return Err("Secured hotspot requires a password of at least 8 characters".into());
        }
        if self.max_clients == 0 {
            return Err("Hotspot must allow at least one client".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Discovery Configuration
// ----------------------------------------------------------------------------

/// Timing for the device registry sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Period of the prune sweep evicting stale devices
    pub prune_interval: Duration,
    /// Age of `last_seen` beyond which a device is presumed gone
    pub staleness_threshold: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            prune_interval: Duration::from_secs(10),
            staleness_threshold: Duration::from_secs(300), // 5 minutes
        }
    }
}

// ----------------------------------------------------------------------------
// Monitoring Configuration
// ----------------------------------------------------------------------------

/// Timing for performance snapshot collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Period of the performance-metrics tick
    pub metrics_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_interval: Duration::from_secs(5),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the engine's channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size of the broadcast event channel (slow subscribers lag)
    pub event_buffer_size: usize,
    /// Buffer size for discovery batch notifications
    pub discovery_batch_buffer_size: usize,
    /// Buffer size for OS connectivity-change notifications
    pub connectivity_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 64,          // UI updates need responsiveness
            discovery_batch_buffer_size: 16, // batches arrive at protocol cadence
            connectivity_buffer_size: 16,
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration aggregating every lanlink sub-config
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LanlinkConfig {
    pub network: NetworkConfig,
    pub hotspot: HotspotConfig,
    pub discovery: DiscoveryConfig,
    pub monitoring: MonitoringConfig,
    pub channels: ChannelConfig,
}

impl LanlinkConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing (short timings, tiny limits)
    pub fn testing() -> Self {
        Self {
            network: NetworkConfig {
                default_port: 0, // OS-assigned port
                session_timeout: Duration::from_secs(60),
                max_concurrent_transfers: 2,
                max_file_size: 1024 * 1024, // 1 MB
                scan_timeout: Duration::from_secs(5),
                max_saved_networks: 3,
                ..NetworkConfig::default()
            },
            hotspot: HotspotConfig::default(),
            discovery: DiscoveryConfig {
                prune_interval: Duration::from_millis(100),
                staleness_threshold: Duration::from_secs(1),
            },
            monitoring: MonitoringConfig {
                metrics_interval: Duration::from_millis(100),
            },
            channels: ChannelConfig {
                event_buffer_size: 128,
                discovery_batch_buffer_size: 16,
                connectivity_buffer_size: 16,
            },
        }
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> core::result::Result<(), String> {
        if self.network.max_concurrent_transfers == 0 {
            return Err("Max concurrent transfers cannot be zero".into());
        }
        if self.network.max_file_size == 0 {
            return Err("Max file size cannot be zero".into());
        }
        if self.network.max_saved_networks == 0 {
            return Err("Max saved networks cannot be zero".into());
        }
        if self.network.scan_timeout.is_zero() {
            return Err("Scan timeout cannot be zero".into());
        }
        if self.network.session_timeout.is_zero() {
            return Err("Session timeout cannot be zero".into());
        }
        if self.discovery.prune_interval.is_zero() {
            return Err("Prune interval cannot be zero".into());
        }
        if self.discovery.staleness_threshold < self.discovery.prune_interval {
            return Err("Staleness threshold must be at least one prune interval".into());
        }
        if self.monitoring.metrics_interval.is_zero() {
            return Err("Metrics interval cannot be zero".into());
        }
        if self.channels.event_buffer_size == 0 {
            return Err("Event buffer size cannot be zero".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Core identifier and time types for the lanlink engine
//!
//! Newtype patterns for the identifiers that cross component boundaries, plus
//! the millisecond timestamp and the injectable time source used by staleness
//! and expiry logic.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BSSID
// ----------------------------------------------------------------------------

/// Hardware identifier of a specific Wi-Fi access point (6-byte MAC address).
///
/// Distinct from the SSID, which is the human-readable network name and may be
/// shared by many access points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bssid([u8; 6]);

impl Bssid {
    /// Create a new BSSID from raw bytes
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for Bssid {
    type Err = crate::LanlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for (i, part) in s.split(|c| c == ':' || c == '-').enumerate() {
            if i >= 6 {
                return Err(crate::LanlinkError::config_error("BSSID has too many octets"));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| crate::LanlinkError::config_error("Invalid hex in BSSID"))?;
            count = i + 1;
        }
        if count != 6 {
            return Err(crate::LanlinkError::config_error(
                "BSSID must be exactly 6 octets",
            ));
        }
        Ok(Self(bytes))
    }
}

// ----------------------------------------------------------------------------
// Generated Identifiers
// ----------------------------------------------------------------------------

/// Identifier of one shared file entry, embedded in the share URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareId(Uuid);

impl ShareId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ShareId {
    type Err = crate::LanlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| crate::LanlinkError::config_error("Invalid share id"))
    }
}

/// Identifier of one tracked transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Identifier of a discovered device, assigned by the discovery protocol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add a duration to this timestamp
    pub fn add(&self, duration: core::time::Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as u64))
    }

    /// Duration elapsed since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Trait for providing timestamps
///
/// Staleness eviction and share expiry compare against this clock rather than
/// calling the system clock directly, so tests can substitute a manual source.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard library implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually advanced time source for deterministic tests
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    millis: std::sync::atomic::AtomicU64,
}

impl ManualTimeSource {
    /// Create a manual source starting at the given timestamp
    pub fn starting_at(timestamp: Timestamp) -> Self {
        Self {
            millis: std::sync::atomic::AtomicU64::new(timestamp.as_millis()),
        }
    }

    /// Advance the clock by a duration
    pub fn advance(&self, duration: core::time::Duration) {
        self.millis.fetch_add(
            duration.as_millis() as u64,
            std::sync::atomic::Ordering::SeqCst,
        );
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.millis.load(std::sync::atomic::Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

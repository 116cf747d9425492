//! Error types for the lanlink engine
//!
//! Per-subsystem error enums unified under the top-level [`LanlinkError`].
//! Every operation boundary converts failures into an `Error` event on the
//! broadcast channel plus one of these values to the direct caller; nothing is
//! allowed to escape into the embedding application as a panic.

use crate::platform::Permission;
use crate::types::ShareId;

// ----------------------------------------------------------------------------
// Wi-Fi Errors
// ----------------------------------------------------------------------------

/// Errors from scanning and joining Wi-Fi networks
#[derive(Debug, thiserror::Error)]
pub enum WifiError {
    #[error("A scan is already in flight")]
    ScanInProgress,
    #[error("Scan failed: {reason}")]
    ScanFailed { reason: String },
    #[error("Scan timed out after {duration_ms}ms")]
    ScanTimeout { duration_ms: u64 },
    #[error("Network {ssid} is secured and requires a password")]
    PasswordRequired { ssid: String },
    #[error("Connection to {ssid} failed: {reason}")]
    ConnectionFailed { ssid: String, reason: String },
    #[error("Not connected to any network")]
    NotConnected,
    #[error("No saved network with BSSID {bssid}")]
    UnknownNetwork { bssid: crate::types::Bssid },
}

// ----------------------------------------------------------------------------
// Discovery Errors
// ----------------------------------------------------------------------------

/// Errors from the LAN device discovery service
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Discovery is already running")]
    AlreadyRunning,
    #[error("Discovery is not running")]
    NotRunning,
    #[error("Discovery protocol failed: {reason}")]
    ProtocolFailed { reason: String },
}

// ----------------------------------------------------------------------------
// Sharing Errors
// ----------------------------------------------------------------------------

/// Errors from the embedded file-sharing server
#[derive(Debug, thiserror::Error)]
pub enum SharingError {
    #[error("Sharing server is already running")]
    AlreadyRunning,
    #[error("Sharing server is not running")]
    NotRunning,
    #[error("File is too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Unknown share id: {id}")]
    UnknownShare { id: ShareId },
    #[error("Failed to bind sharing server on port {port}: {reason}")]
    BindFailed { port: u16, reason: String },
    #[error("Shared file is not readable: {path}")]
    FileUnreadable { path: String },
}

// ----------------------------------------------------------------------------
// Transfer Errors
// ----------------------------------------------------------------------------

/// Errors from concurrent transfer management
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Concurrent transfer limit reached: {active}/{max}")]
    ConcurrencyLimit { active: usize, max: usize },
    #[error("Unknown transfer session: {id}")]
    UnknownSession { id: crate::types::TransferId },
    #[error("Transfer failed: {reason}")]
    Failed { reason: String },
}

// ----------------------------------------------------------------------------
// Hotspot Errors
// ----------------------------------------------------------------------------

/// Errors from device-hosted access point control
#[derive(Debug, thiserror::Error)]
pub enum HotspotError {
    #[error("Hotspot cannot start while a Wi-Fi client connection is active")]
    ClientModeActive,
    #[error("Hotspot is already enabled")]
    AlreadyEnabled,
    #[error("Hotspot is not enabled")]
    NotEnabled,
    #[error("Access point operation failed: {reason}")]
    PlatformFailed { reason: String },
}

// ----------------------------------------------------------------------------
// Storage Errors
// ----------------------------------------------------------------------------

/// Errors from the secure key-value store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Secure storage is not available")]
    NotAvailable,
    #[error("Encryption or decryption failed")]
    EncryptionFailed,
    #[error("Stored data is malformed: {reason}")]
    Corrupted { reason: String },
    #[error("Storage I/O failed: {reason}")]
    Io { reason: String },
}

// ----------------------------------------------------------------------------
// Top-level Error
// ----------------------------------------------------------------------------

/// Unified error type for the lanlink engine
#[derive(Debug, thiserror::Error)]
pub enum LanlinkError {
    #[error("Wi-Fi error: {0}")]
    Wifi(#[from] WifiError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Sharing error: {0}")]
    Sharing(#[from] SharingError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Hotspot error: {0}")]
    Hotspot(#[from] HotspotError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: Permission },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl LanlinkError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        LanlinkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a permission-denied error
    pub fn permission_denied(permission: Permission) -> Self {
        LanlinkError::PermissionDenied { permission }
    }

    /// Create a scan-failed error with a reason
    pub fn scan_failed<T: Into<String>>(reason: T) -> Self {
        LanlinkError::Wifi(WifiError::ScanFailed {
            reason: reason.into(),
        })
    }

    /// Create a connection-failed error
    pub fn connection_failed<S: Into<String>, R: Into<String>>(ssid: S, reason: R) -> Self {
        LanlinkError::Wifi(WifiError::ConnectionFailed {
            ssid: ssid.into(),
            reason: reason.into(),
        })
    }

    /// Create a discovery protocol error
    pub fn discovery_failed<T: Into<String>>(reason: T) -> Self {
        LanlinkError::Discovery(DiscoveryError::ProtocolFailed {
            reason: reason.into(),
        })
    }

    /// Create a hotspot platform error
    pub fn hotspot_failed<T: Into<String>>(reason: T) -> Self {
        LanlinkError::Hotspot(HotspotError::PlatformFailed {
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, LanlinkError>;
pub type LanlinkResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_errors_convert_to_top_level() {
        let err: LanlinkError = WifiError::ScanInProgress.into();
        assert!(matches!(err, LanlinkError::Wifi(WifiError::ScanInProgress)));

        let err: LanlinkError = TransferError::ConcurrencyLimit { active: 3, max: 3 }.into();
        assert!(err.to_string().contains("3/3"));
    }

    #[test]
    fn test_permission_denied_message_names_permission() {
        let err = LanlinkError::permission_denied(Permission::Location);
        assert!(err.to_string().contains("location"));
    }
}

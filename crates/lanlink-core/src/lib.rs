//! lanlink Core
//!
//! Foundational types for the lanlink local-network engine: identifiers,
//! configuration, the broadcast event taxonomy, the data model, platform
//! capability traits and secure storage. The orchestration lives in the
//! `lanlink-runtime` crate; this crate holds everything both sides of that
//! boundary agree on.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod events;
pub mod model;
pub mod platform;
pub mod storage;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{
    ChannelConfig, DiscoveryConfig, HotspotConfig, LanlinkConfig, MonitoringConfig, NetworkConfig,
    SecurityKind,
};
pub use errors::{
    DiscoveryError, HotspotError, LanlinkError, LanlinkResult, SharingError, StorageError,
    TransferError, WifiError,
};
pub use events::{
    create_event_channel, emit, subscribe_events, EventReceiver, EventSender, NetworkEvent,
};
pub use model::{
    ConnectivityChange, ConnectivityKind, ConnectivitySnapshot, DeviceType, DiscoveredDevice,
    NetworkStatistics, PerformanceSnapshot, SavedNetwork, SharedFileEntry, TransferDirection,
    TransferSession, TransferState, WifiNetwork,
};
pub use platform::{
    ConnectivitySource, DiscoveryProtocol, HotspotPlatform, MetricsProvider, NoopMetricsProvider,
    Permission, PermissionGate, WifiPlatform,
};
pub use storage::{EncryptedFileStorage, MemoryStorage, SecureStorage};
pub use types::{
    Bssid, DeviceId, ManualTimeSource, ShareId, SystemTimeSource, TimeSource, Timestamp,
    TransferId,
};

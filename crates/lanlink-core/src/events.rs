//! Broadcast event channel for the lanlink engine
//!
//! All state changes flow to subscribers through a single broadcast channel of
//! [`NetworkEvent`], a closed tagged union with one concrete payload shape per
//! variant. There is no replay buffer: a subscriber attaching after an event
//! fires never observes it.

use crate::config::ChannelConfig;
use crate::model::ConnectivityKind;
use crate::platform::Permission;
use crate::types::ShareId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

// ----------------------------------------------------------------------------
// NetworkEvent: Engine → Subscribers
// ----------------------------------------------------------------------------

/// State-change notifications emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetworkEvent {
    /// Engine finished initialization
    Initialized,
    /// Configuration was replaced and dependents reinitialized
    ConfigUpdated,
    /// Connectivity kind changed (Wi-Fi, ethernet, cellular, offline)
    ConnectivityChanged { kind: ConnectivityKind },
    /// A scan completed with this many networks found
    NetworksScanned { count: usize },
    /// Join of the named network started
    Connecting { ssid: String },
    /// Join of the named network succeeded
    Connected { ssid: String },
    /// Teardown of the named connection started
    Disconnecting { ssid: String },
    /// No longer connected to any network
    Disconnected,
    /// A required permission was denied by the platform
    PermissionDenied { permission: Permission },
    /// Device discovery started
    DiscoveryStarted,
    /// Device discovery stopped
    DiscoveryStopped,
    /// A discovery batch replaced the registry with this many devices
    DevicesDiscovered { count: usize },
    /// The sharing server is listening
    SharingServerStarted,
    /// The sharing server shut down
    SharingServerStopped,
    /// A file was registered for sharing
    FileShared { path: PathBuf },
    /// A QR code was generated for an existing share
    QrCodeGenerated { id: ShareId },
    /// The device-hosted access point is up
    HotspotEnabled,
    /// The device-hosted access point is down
    HotspotDisabled,
    /// The saved-network registry was persisted with this many entries
    NetworksSaved { count: usize },
    /// A recoverable failure, already converted at the operation boundary
    Error { message: String },
}

// ----------------------------------------------------------------------------
// Channel Types
// ----------------------------------------------------------------------------

pub type EventSender = broadcast::Sender<NetworkEvent>;
pub type EventReceiver = broadcast::Receiver<NetworkEvent>;

/// Create the broadcast event channel (One-to-Many: Engine → Subscribers)
///
/// Additional receivers are created with [`subscribe_events`]; the returned
/// receiver can simply be dropped when only the sender is needed.
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    broadcast::channel(config.event_buffer_size)
}

/// Create an event receiver by subscribing to the broadcast channel
pub fn subscribe_events(sender: &EventSender) -> EventReceiver {
    sender.subscribe()
}

/// Send an event, ignoring the absence of subscribers.
///
/// A broadcast send only fails when no receiver exists, which is a legal state
/// for an embedded engine (the host may not have attached its UI yet).
pub fn emit(sender: &EventSender, event: NetworkEvent) {
    let _ = sender.send(event);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

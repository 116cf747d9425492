//! lanlink Runtime
//!
//! The coordination engine of the lanlink local-network subsystem: a
//! [`Coordinator`] owning Wi-Fi control, LAN device discovery, an embedded
//! file-sharing server, concurrent transfer management and hotspot control,
//! all reporting through one broadcast event channel.
//!
//! Hosts construct the engine with explicit platform capabilities:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lanlink_runtime::{testing, Coordinator};
//!
//! # #[tokio::main]
//! # async fn main() -> lanlink_core::LanlinkResult<()> {
//! let coordinator = Coordinator::builder()
//!     .wifi_platform(Arc::new(testing::FakeWifiPlatform::with_networks(vec![])))
//!     .hotspot_platform(Arc::new(testing::FakeHotspotPlatform::new()))
//!     .connectivity_source(Box::new(testing::ScriptedConnectivitySource::new(vec![])))
//!     .discovery_protocol(Box::new(|| testing::push_discovery_protocol().1))
//!     .permissions(Arc::new(testing::StaticPermissionGate::allow_all()))
//!     .build()?;
//!
//! let _events = coordinator.subscribe();
//! coordinator.initialize(None).await?;
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config_store;
pub mod connectivity;
pub mod coordinator;
pub mod discovery;
pub mod hotspot;
mod scheduler;
pub mod sharing;
pub mod testing;
pub mod transfers;
pub mod wifi;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config_store::ConfigStore;
pub use connectivity::ConnectivityMonitor;
pub use coordinator::{Coordinator, CoordinatorBuilder, DiscoveryProtocolFactory};
pub use discovery::DiscoveryService;
pub use hotspot::{HotspotController, HotspotOverrides};
pub use sharing::{ShareFileOptions, ShareServerOptions, SharingServer};
pub use transfers::{TransferHandle, TransferSessionManager};
pub use wifi::WifiManager;

// Re-export the core crate so hosts depend on one name.
pub use lanlink_core as core;

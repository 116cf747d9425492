//! Data model for the lanlink engine

pub mod connectivity;
pub mod device;
pub mod sharing;
pub mod stats;
pub mod transfer;
pub mod wifi;

pub use connectivity::{ConnectivityChange, ConnectivityKind, ConnectivitySnapshot};
pub use device::{DeviceType, DiscoveredDevice};
pub use sharing::SharedFileEntry;
pub use stats::{NetworkStatistics, PerformanceSnapshot};
pub use transfer::{TransferDirection, TransferSession, TransferState};
pub use wifi::{SavedNetwork, WifiNetwork};

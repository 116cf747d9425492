//! Wi-Fi scanning, connecting and the saved-network registry
//!
//! Scans are one-shot and guarded against overlap by an atomic in-flight flag
//! released on every path through an RAII guard. Connecting upserts the
//! saved-network registry keyed by BSSID and persists it through the encrypted
//! store. All platform interaction goes through the injected [`WifiPlatform`].

use crate::config_store::ConfigStore;
use crate::connectivity::ConnectivityMonitor;
use lanlink_core::{
    emit, model::wifi::is_secure_capability, Bssid, EventSender, LanlinkError, LanlinkResult,
    NetworkEvent, Permission, PermissionGate, SavedNetwork, SecureStorage, TimeSource, WifiError,
    WifiNetwork, WifiPlatform,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed interval between triggering a platform scan and reading its results
const SCAN_SETTLE: Duration = Duration::from_millis(1500);

/// Storage key of the persisted saved-network registry
const SAVED_NETWORKS_KEY: &str = "saved_networks";

// ----------------------------------------------------------------------------
// Wi-Fi Manager
// ----------------------------------------------------------------------------

/// One-shot scanner plus connector with a persisted known-network registry
pub struct WifiManager {
    platform: Arc<dyn WifiPlatform>,
    permissions: Arc<dyn PermissionGate>,
    storage: Arc<Mutex<Box<dyn SecureStorage>>>,
    events: EventSender,
    time: Arc<dyn TimeSource>,
    config: ConfigStore,
    connectivity: Arc<ConnectivityMonitor>,
    scan_in_flight: Arc<AtomicBool>,
    available: RwLock<Vec<WifiNetwork>>,
    saved: Mutex<HashMap<Bssid, SavedNetwork>>,
    connected: RwLock<Option<WifiNetwork>>,
}

impl WifiManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn WifiPlatform>,
        permissions: Arc<dyn PermissionGate>,
        storage: Arc<Mutex<Box<dyn SecureStorage>>>,
        events: EventSender,
        time: Arc<dyn TimeSource>,
        config: ConfigStore,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            platform,
            permissions,
            storage,
            events,
            time,
            config,
            connectivity,
            scan_in_flight: Arc::new(AtomicBool::new(false)),
            available: RwLock::new(Vec::new()),
            saved: Mutex::new(HashMap::new()),
            connected: RwLock::new(None),
        }
    }

    // ------------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------------

    /// Run a one-shot scan for nearby access points.
    ///
    /// Fails immediately if a scan is already in flight, leaving the previous
    /// results untouched. Requires the location permission.
    pub async fn scan_networks(&self) -> LanlinkResult<Vec<WifiNetwork>> {
        if !self.permissions.request(Permission::Location).await {
            emit(
                &self.events,
                NetworkEvent::PermissionDenied {
                    permission: Permission::Location,
                },
            );
            return Err(LanlinkError::permission_denied(Permission::Location));
        }

        let _guard = match ScanGuard::acquire(&self.scan_in_flight) {
            Some(guard) => guard,
            None => {
                let err = WifiError::ScanInProgress;
                emit(
                    &self.events,
                    NetworkEvent::Error {
                        message: err.to_string(),
                    },
                );
                return Err(err.into());
            }
        };

        let scan_timeout = self.config.network().scan_timeout;
        let result = tokio::time::timeout(scan_timeout, self.perform_scan()).await;

        match result {
            Ok(Ok(networks)) => {
                let count = networks.len();
                *self.available.write().expect("scan results poisoned") = networks.clone();
                info!(count, "scan finished");
                emit(&self.events, NetworkEvent::NetworksScanned { count });
                Ok(networks)
            }
            Ok(Err(e)) => {
                emit(
                    &self.events,
                    NetworkEvent::Error {
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
            Err(_) => {
                let err = WifiError::ScanTimeout {
                    duration_ms: scan_timeout.as_millis() as u64,
                };
                emit(
                    &self.events,
                    NetworkEvent::Error {
                        message: err.to_string(),
                    },
                );
                Err(err.into())
            }
        }
    }

    async fn perform_scan(&self) -> LanlinkResult<Vec<WifiNetwork>> {
        self.platform.trigger_scan().await?;
        tokio::time::sleep(SCAN_SETTLE).await;
        let mut networks = self.platform.scan_results().await?;

        // Re-derive security from the capability string; the platform only
        // owes us the raw token list.
        for network in &mut networks {
            network.is_secure = is_secure_capability(&network.capabilities);
        }
        networks.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
        Ok(networks)
    }

    /// Defensive copy of the most recent scan results
    pub fn available_networks(&self) -> Vec<WifiNetwork> {
        self.available.read().expect("scan results poisoned").clone()
    }

    // ------------------------------------------------------------------------
    // Connecting
    // ------------------------------------------------------------------------

    /// Join the given network, updating the saved-network registry on success
    pub async fn connect_to_network(
        &self,
        network: &WifiNetwork,
        password: Option<&str>,
    ) -> LanlinkResult<()> {
        if network.is_secure && password.map(str::trim).unwrap_or("").is_empty() {
            let err = WifiError::PasswordRequired {
                ssid: network.ssid.clone(),
            };
            emit(
                &self.events,
                NetworkEvent::Error {
                    message: err.to_string(),
                },
            );
            return Err(err.into());
        }

        emit(
            &self.events,
            NetworkEvent::Connecting {
                ssid: network.ssid.clone(),
            },
        );

        if let Err(e) = self.platform.join(network, password).await {
            emit(
                &self.events,
                NetworkEvent::Error {
                    message: e.to_string(),
                },
            );
            return Err(e);
        }

        *self.connected.write().expect("connection poisoned") = Some(network.clone());
        self.connectivity
            .note_wifi_connected(&network.ssid, network.bssid, network.signal_strength);

        self.upsert_saved(network, password.map(str::to_string));
        match self.persist_saved() {
            Ok(count) => emit(&self.events, NetworkEvent::NetworksSaved { count }),
            // The connection itself succeeded; persistence failure is reported
            // but does not roll it back.
            Err(e) => {
                warn!("failed to persist saved networks: {e}");
                emit(
                    &self.events,
                    NetworkEvent::Error {
                        message: e.to_string(),
                    },
                );
            }
        }

        info!(ssid = %network.ssid, "connected");
        emit(
            &self.events,
            NetworkEvent::Connected {
                ssid: network.ssid.clone(),
            },
        );
        Ok(())
    }

    /// Tear down the current connection; a no-op when not connected
    pub async fn disconnect(&self) -> LanlinkResult<()> {
        let current = self.connected.read().expect("connection poisoned").clone();
        let Some(network) = current else {
            return Ok(());
        };

        emit(
            &self.events,
            NetworkEvent::Disconnecting {
                ssid: network.ssid.clone(),
            },
        );

        if let Err(e) = self.platform.leave().await {
            emit(
                &self.events,
                NetworkEvent::Error {
                    message: e.to_string(),
                },
            );
            return Err(e);
        }

        *self.connected.write().expect("connection poisoned") = None;
        self.connectivity.note_disconnected();
        info!(ssid = %network.ssid, "disconnected");
        emit(&self.events, NetworkEvent::Disconnected);
        Ok(())
    }

    /// Whether a Wi-Fi client connection initiated by the engine is live
    pub fn is_connected(&self) -> bool {
        self.connected.read().expect("connection poisoned").is_some()
    }

    /// The network the engine is currently joined to, if any
    pub fn current_connection(&self) -> Option<WifiNetwork> {
        self.connected.read().expect("connection poisoned").clone()
    }

    // ------------------------------------------------------------------------
    // Saved Networks
    // ------------------------------------------------------------------------

    /// Defensive copy of the saved-network registry
    pub fn saved_networks(&self) -> Vec<SavedNetwork> {
        self.saved
            .lock()
            .expect("saved networks poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Remove a saved network and persist the registry
    pub fn forget_network(&self, bssid: Bssid) -> LanlinkResult<()> {
        {
            let mut saved = self.saved.lock().expect("saved networks poisoned");
            if saved.remove(&bssid).is_none() {
                return Err(WifiError::UnknownNetwork { bssid }.into());
            }
        }
        let count = self.persist_saved()?;
        emit(&self.events, NetworkEvent::NetworksSaved { count });
        Ok(())
    }

    /// Load the persisted registry; called once during initialization
    pub fn load_saved(&self) -> LanlinkResult<usize> {
        let storage = self.storage.lock().expect("storage poisoned");
        let Some(bytes) = storage.retrieve(SAVED_NETWORKS_KEY)? else {
            return Ok(0);
        };
        drop(storage);

        let list: Vec<SavedNetwork> = serde_json::from_slice(&bytes)
            .map_err(|e| LanlinkError::config_error(format!("saved networks corrupted: {e}")))?;
        let count = list.len();

        let mut saved = self.saved.lock().expect("saved networks poisoned");
        *saved = list.into_iter().map(|n| (n.bssid, n)).collect();
        debug!(count, "saved networks loaded");
        Ok(count)
    }

    fn upsert_saved(&self, network: &WifiNetwork, password: Option<String>) {
        let now = self.time.now();
        let max = self.config.network().max_saved_networks;
        let mut saved = self.saved.lock().expect("saved networks poisoned");

        match saved.get_mut(&network.bssid) {
            Some(existing) => existing.record_reconnect(password, now),
            None => {
                saved.insert(
                    network.bssid,
                    SavedNetwork::from_network(network, password, now),
                );
            }
        }

        // Bound the registry, evicting the longest-unused entries but never
        // the one just touched.
        while saved.len() > max {
            let oldest = saved
                .values()
                .filter(|n| n.bssid != network.bssid)
                .min_by_key(|n| n.last_connected)
                .map(|n| n.bssid);
            match oldest {
                Some(bssid) => {
                    saved.remove(&bssid);
                }
                None => break,
            }
        }
    }

    fn persist_saved(&self) -> LanlinkResult<usize> {
        let list: Vec<SavedNetwork> = {
            let saved = self.saved.lock().expect("saved networks poisoned");
            saved.values().cloned().collect()
        };
        let bytes = serde_json::to_vec(&list)
            .map_err(|e| LanlinkError::config_error(format!("saved networks encode: {e}")))?;

        let mut storage = self.storage.lock().expect("storage poisoned");
        storage.store(SAVED_NETWORKS_KEY, bytes)?;
        Ok(list.len())
    }
}

// ----------------------------------------------------------------------------
// Scan Guard
// ----------------------------------------------------------------------------

/// RAII guard for the single in-flight scan; released on success, failure or
/// cancellation alike
struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl ScanGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        wifi_network, FakeWifiPlatform, StaticPermissionGate,
    };
    use lanlink_core::{
        create_event_channel, ChannelConfig, LanlinkConfig, ManualTimeSource, MemoryStorage,
        Timestamp,
    };

    fn build_manager(
        platform: Arc<FakeWifiPlatform>,
        permissions: StaticPermissionGate,
        time: Arc<ManualTimeSource>,
    ) -> (Arc<WifiManager>, lanlink_core::EventReceiver) {
        let (events, receiver) = create_event_channel(&ChannelConfig::default());
        let connectivity = Arc::new(ConnectivityMonitor::new(
            events.clone(),
            &ChannelConfig::default(),
        ));
        let storage: Arc<Mutex<Box<dyn SecureStorage>>> =
            Arc::new(Mutex::new(Box::new(MemoryStorage::new())));
        let manager = WifiManager::new(
            platform,
            Arc::new(permissions),
            storage,
            events,
            time,
            ConfigStore::new(LanlinkConfig::testing()),
            connectivity,
        );
        (Arc::new(manager), receiver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_sorts_by_signal_strength() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![
            wifi_network("CafeWifi", 2, -70, "[ESS]"),
            wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP][ESS]"),
        ]));
        let (manager, _events) = build_manager(
            platform,
            StaticPermissionGate::allow_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        let networks = manager.scan_networks().await.unwrap();
        assert_eq!(networks[0].ssid, "HomeWifi");
        assert_eq!(networks[1].ssid, "CafeWifi");
        assert!(networks[0].is_secure);
        assert!(!networks[1].is_secure);
        assert_eq!(manager.available_networks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_scan_rejected_without_clobbering_results() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![wifi_network(
            "HomeWifi", 1, -40, "[ESS]",
        )]));
        let (manager, _events) = build_manager(
            platform,
            StaticPermissionGate::allow_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        manager.scan_networks().await.unwrap();
        let before = manager.available_networks();

        let first = manager.scan_networks();
        tokio::pin!(first);
        // Drive the first scan into its settle sleep, then race a second one.
        assert!(futures::poll!(first.as_mut()).is_pending());

        let second = manager.scan_networks().await;
        assert!(matches!(
            second,
            Err(LanlinkError::Wifi(WifiError::ScanInProgress))
        ));
        assert_eq!(manager.available_networks(), before);

        first.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_requires_location_permission() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        let (manager, mut events) = build_manager(
            Arc::clone(&platform),
            StaticPermissionGate::deny_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        let result = manager.scan_networks().await;
        assert!(matches!(
            result,
            Err(LanlinkError::PermissionDenied {
                permission: Permission::Location
            })
        ));
        assert_eq!(platform.scan_count(), 0);
        assert_eq!(
            events.try_recv().unwrap(),
            NetworkEvent::PermissionDenied {
                permission: Permission::Location
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_secure_network_requires_password() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        let (manager, _events) = build_manager(
            Arc::clone(&platform),
            StaticPermissionGate::allow_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        let network = wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP]");
        for password in [None, Some(""), Some("   ")] {
            let result = manager.connect_to_network(&network, password).await;
            assert!(matches!(
                result,
                Err(LanlinkError::Wifi(WifiError::PasswordRequired { .. }))
            ));
        }
        assert!(!manager.is_connected());
        assert_eq!(platform.join_count(), 0);
        assert!(manager.saved_networks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_upserts_saved_network() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(1_000)));
        let (manager, _events) = build_manager(
            platform,
            StaticPermissionGate::allow_all(),
            Arc::clone(&time),
        );

        let network = wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP]");
        manager
            .connect_to_network(&network, Some("secret"))
            .await
            .unwrap();

        let saved = manager.saved_networks();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].connection_count, 1);
        assert!(manager.is_connected());

        time.advance(Duration::from_secs(60));
        manager
            .connect_to_network(&network, Some("secret"))
            .await
            .unwrap();
        let saved = manager.saved_networks();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].connection_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_registry_bounded_with_oldest_eviction() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let (manager, _events) = build_manager(
            platform,
            StaticPermissionGate::allow_all(),
            Arc::clone(&time),
        );

        // Testing config allows 3 saved networks.
        for i in 0..4u8 {
            time.advance(Duration::from_secs(10));
            let network = wifi_network(&format!("net-{i}"), i + 1, -50, "[ESS]");
            manager.connect_to_network(&network, None).await.unwrap();
        }

        let saved = manager.saved_networks();
        assert_eq!(saved.len(), 3);
        assert!(!saved.iter().any(|n| n.ssid == "net-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_join_leaves_state_untouched() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        platform.fail_next_join("radio busy");
        let (manager, _events) = build_manager(
            platform,
            StaticPermissionGate::allow_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        let network = wifi_network("HomeWifi", 1, -40, "[ESS]");
        assert!(manager.connect_to_network(&network, None).await.is_err());
        assert!(!manager.is_connected());
        assert!(manager.saved_networks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_noop_when_not_connected() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        let (manager, mut events) = build_manager(
            platform,
            StaticPermissionGate::allow_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        manager.disconnect().await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_networks_persist_roundtrip() {
        let platform = Arc::new(FakeWifiPlatform::with_networks(vec![]));
        let (manager, _events) = build_manager(
            Arc::clone(&platform),
            StaticPermissionGate::allow_all(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
        );

        let network = wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP]");
        manager
            .connect_to_network(&network, Some("secret"))
            .await
            .unwrap();

        // A fresh manager over the same storage sees the persisted entry.
        // (Re-wire through the same Arc'd storage.)
        let storage = Arc::clone(&manager.storage);
        let (events, _r) = create_event_channel(&ChannelConfig::default());
        let connectivity = Arc::new(ConnectivityMonitor::new(
            events.clone(),
            &ChannelConfig::default(),
        ));
        let fresh = WifiManager::new(
            platform,
            Arc::new(StaticPermissionGate::allow_all()),
            storage,
            events,
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
            ConfigStore::new(LanlinkConfig::testing()),
            connectivity,
        );
        assert_eq!(fresh.load_saved().unwrap(), 1);
        assert_eq!(fresh.saved_networks()[0].ssid, "HomeWifi");
    }
}

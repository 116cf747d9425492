//! Top-level coordinator
//!
//! Wires the components together and exposes the engine's command surface:
//! initialization, configuration replacement, Wi-Fi commands, discovery,
//! sharing, hotspot control, transfer cancellation and aggregated statistics.
//! The Coordinator owns and constructs its components, receiving every
//! platform capability (or a factory for it) at construction so hosts and
//! tests substitute their own implementations.

use crate::config_store::ConfigStore;
use crate::connectivity::ConnectivityMonitor;
use crate::discovery::DiscoveryService;
use crate::hotspot::{HotspotController, HotspotOverrides};
use crate::scheduler::Scheduler;
use crate::sharing::{ShareFileOptions, ShareServerOptions, SharingServer};
use crate::transfers::TransferSessionManager;
use crate::wifi::WifiManager;
use lanlink_core::{
    create_event_channel, emit, subscribe_events, ConnectivitySource, DiscoveryProtocol,
    EventReceiver, EventSender, HotspotPlatform, LanlinkConfig, LanlinkError, LanlinkResult,
    MetricsProvider, MemoryStorage, NetworkEvent, NetworkStatistics, NoopMetricsProvider,
    Permission, PermissionGate, PerformanceSnapshot, SecureStorage, SharedFileEntry, ShareId,
    SystemTimeSource, TimeSource, TransferId, WifiNetwork, WifiPlatform,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Storage key of the persisted engine configuration
const CONFIG_KEY: &str = "config";

/// Factory producing a fresh discovery protocol instance per discovery run
pub type DiscoveryProtocolFactory = Box<dyn Fn() -> Box<dyn DiscoveryProtocol> + Send + Sync>;

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Builder wiring platform capabilities into a [`Coordinator`]
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: Option<LanlinkConfig>,
    wifi_platform: Option<Arc<dyn WifiPlatform>>,
    hotspot_platform: Option<Arc<dyn HotspotPlatform>>,
    connectivity_source: Option<Box<dyn ConnectivitySource>>,
    discovery_factory: Option<DiscoveryProtocolFactory>,
    permissions: Option<Arc<dyn PermissionGate>>,
    metrics: Option<Arc<dyn MetricsProvider>>,
    storage: Option<Box<dyn SecureStorage>>,
    time: Option<Arc<dyn TimeSource>>,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LanlinkConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn wifi_platform(mut self, platform: Arc<dyn WifiPlatform>) -> Self {
        self.wifi_platform = Some(platform);
        self
    }

    pub fn hotspot_platform(mut self, platform: Arc<dyn HotspotPlatform>) -> Self {
        self.hotspot_platform = Some(platform);
        self
    }

    pub fn connectivity_source(mut self, source: Box<dyn ConnectivitySource>) -> Self {
        self.connectivity_source = Some(source);
        self
    }

    pub fn discovery_protocol(mut self, factory: DiscoveryProtocolFactory) -> Self {
        self.discovery_factory = Some(factory);
        self
    }

    pub fn permissions(mut self, permissions: Arc<dyn PermissionGate>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn storage(mut self, storage: Box<dyn SecureStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn time(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = Some(time);
        self
    }

    /// Construct the Coordinator. Platform capabilities are required; config,
    /// storage, metrics and the clock fall back to sensible defaults.
    pub fn build(self) -> LanlinkResult<Coordinator> {
        let wifi_platform = self
            .wifi_platform
            .ok_or_else(|| LanlinkError::config_error("wifi platform is required"))?;
        let hotspot_platform = self
            .hotspot_platform
            .ok_or_else(|| LanlinkError::config_error("hotspot platform is required"))?;
        let connectivity_source = self
            .connectivity_source
            .ok_or_else(|| LanlinkError::config_error("connectivity source is required"))?;
        let discovery_factory = self
            .discovery_factory
            .ok_or_else(|| LanlinkError::config_error("discovery protocol is required"))?;
        let permissions = self
            .permissions
            .ok_or_else(|| LanlinkError::config_error("permission gate is required"))?;

        let config = self.config.unwrap_or_default();
        config.validate().map_err(LanlinkError::config_error)?;

        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetricsProvider));
        let time = self
            .time
            .unwrap_or_else(|| Arc::new(SystemTimeSource::new()));
        let storage: Arc<StdMutex<Box<dyn SecureStorage>>> = Arc::new(StdMutex::new(
            self.storage.unwrap_or_else(|| Box::new(MemoryStorage::new())),
        ));

        let (events, _subscriber) = create_event_channel(&config.channels);
        let config_store = ConfigStore::new(config.clone());

        let connectivity = Arc::new(ConnectivityMonitor::new(events.clone(), &config.channels));
        let wifi = Arc::new(WifiManager::new(
            wifi_platform,
            Arc::clone(&permissions),
            Arc::clone(&storage),
            events.clone(),
            Arc::clone(&time),
            config_store.clone(),
            Arc::clone(&connectivity),
        ));
        let transfers = Arc::new(TransferSessionManager::new(
            events.clone(),
            Arc::clone(&time),
            &config.network,
        ));
        let sharing = Arc::new(SharingServer::new(
            events.clone(),
            Arc::clone(&time),
            Arc::clone(&transfers),
            &config.network,
        ));
        let discovery = Arc::new(DiscoveryService::new(
            events.clone(),
            Arc::clone(&time),
            config.channels.discovery_batch_buffer_size,
        ));
        let hotspot = Arc::new(HotspotController::new(
            hotspot_platform,
            events.clone(),
            config_store.clone(),
            Arc::clone(&wifi),
        ));

        Ok(Coordinator {
            config: config_store,
            events,
            storage,
            time,
            metrics,
            permissions,
            connectivity,
            wifi,
            discovery,
            sharing,
            transfers,
            hotspot,
            connectivity_source: Mutex::new(Some(connectivity_source)),
            discovery_factory,
            performance: Arc::new(RwLock::new(PerformanceSnapshot::default())),
            scheduler: StdMutex::new(None),
            initialized: AtomicBool::new(false),
            op_lock: Mutex::new(()),
        })
    }
}

// ----------------------------------------------------------------------------
// Coordinator
// ----------------------------------------------------------------------------

/// Owns every component and exposes the public command surface
pub struct Coordinator {
    config: ConfigStore,
    events: EventSender,
    storage: Arc<StdMutex<Box<dyn SecureStorage>>>,
    time: Arc<dyn TimeSource>,
    metrics: Arc<dyn MetricsProvider>,
    permissions: Arc<dyn PermissionGate>,
    connectivity: Arc<ConnectivityMonitor>,
    wifi: Arc<WifiManager>,
    discovery: Arc<DiscoveryService>,
    sharing: Arc<SharingServer>,
    transfers: Arc<TransferSessionManager>,
    hotspot: Arc<HotspotController>,
    connectivity_source: Mutex<Option<Box<dyn ConnectivitySource>>>,
    discovery_factory: DiscoveryProtocolFactory,
    performance: Arc<RwLock<PerformanceSnapshot>>,
    scheduler: StdMutex<Option<Scheduler>>,
    initialized: AtomicBool,
    /// Serializes initialize/update_config/shutdown against each other
    op_lock: Mutex<()>,
}

impl Coordinator {
    /// Start building a Coordinator
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Subscribe to the broadcast event channel
    pub fn subscribe(&self) -> EventReceiver {
        subscribe_events(&self.events)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Initialize the engine. Idempotent: returns Ok immediately when already
    /// initialized.
    ///
    /// Permission denials are reported individually and leave the engine in a
    /// degraded mode; only the denial of every permission aborts
    /// initialization.
    pub async fn initialize(&self, config: Option<LanlinkConfig>) -> LanlinkResult<()> {
        let _op = self.op_lock.lock().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Resolve configuration: explicit argument beats persisted state
        // beats the builder's value.
        if let Some(config) = config {
            config
                .validate()
                .map_err(|reason| self.fail(LanlinkError::config_error(reason)))?;
            self.config.replace(config);
            self.persist_config();
        } else if let Some(persisted) = self.load_persisted_config() {
            self.config.replace(persisted);
        }
        let config = self.config.get();
        self.sharing.apply_config(&config.network);
        self.transfers.apply_config(&config.network);

        let mut any_granted = false;
        let mut local_network_granted = false;
        for permission in Permission::ALL {
            if self.permissions.request(permission).await {
                any_granted = true;
                if permission == Permission::LocalNetwork {
                    local_network_granted = true;
                }
            } else {
                warn!(%permission, "permission denied, continuing degraded");
                emit(&self.events, NetworkEvent::PermissionDenied { permission });
            }
        }
        if !any_granted {
            return Err(self.fail(LanlinkError::config_error(
                "initialization failed: every required permission was denied",
            )));
        }

        if let Some(source) = self.connectivity_source.lock().await.take() {
            self.connectivity.start(source);
        }

        match self.wifi.load_saved() {
            Ok(count) if count > 0 => info!(count, "saved networks restored"),
            Ok(_) => {}
            Err(e) => warn!("saved networks unavailable: {e}"),
        }

        if config.network.enable_auto_discovery && local_network_granted {
            self.discovery
                .start((self.discovery_factory)(), &config.discovery);
        }

        self.start_scheduler(&config);
        self.initialized.store(true, Ordering::SeqCst);
        info!("engine initialized");
        emit(&self.events, NetworkEvent::Initialized);
        Ok(())
    }

    /// Replace the configuration wholesale and reinitialize dependents.
    ///
    /// The sharing engine is stopped completely before it is reconfigured and
    /// restarted, so no observer ever sees it bound with stale settings.
    pub async fn update_config(&self, config: LanlinkConfig) -> LanlinkResult<()> {
        let _op = self.op_lock.lock().await;
        self.ensure_initialized()?;

        config
            .validate()
            .map_err(|reason| self.fail(LanlinkError::config_error(reason)))?;

        self.config.replace(config.clone());
        self.persist_config();
        self.transfers.apply_config(&config.network);

        let sharing_was_running = self.sharing.is_running();
        self.sharing.stop_server().await?;
        self.sharing.apply_config(&config.network);
        if sharing_was_running {
            self.sharing
                .start_server(ShareServerOptions::default())
                .await?;
        }

        // Timer periods may have changed; restart the scheduler with them.
        self.stop_scheduler();
        self.start_scheduler(&config);

        info!("configuration updated");
        emit(&self.events, NetworkEvent::ConfigUpdated);
        Ok(())
    }

    /// Stop every running component. Terminal: the engine does not support
    /// re-initialization afterwards.
    pub async fn shutdown(&self) {
        let _op = self.op_lock.lock().await;
        self.stop_scheduler();
        self.discovery.stop();
        if let Err(e) = self.sharing.stop_server().await {
            warn!("sharing server shutdown failed: {e}");
        }
        if self.hotspot.is_enabled() {
            if let Err(e) = self.hotspot.disable().await {
                warn!("hotspot shutdown failed: {e}");
            }
        }
        self.connectivity.stop();
        self.initialized.store(false, Ordering::SeqCst);
        info!("engine shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Wi-Fi Commands
    // ------------------------------------------------------------------------

    pub async fn scan_networks(&self) -> LanlinkResult<Vec<WifiNetwork>> {
        self.ensure_initialized()?;
        self.wifi.scan_networks().await
    }

    pub async fn connect_to_network(
        &self,
        network: &WifiNetwork,
        password: Option<&str>,
    ) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        if self.hotspot.is_enabled() {
            return Err(self.fail(LanlinkError::connection_failed(
                network.ssid.clone(),
                "hotspot mode is active",
            )));
        }
        self.wifi.connect_to_network(network, password).await
    }

    pub async fn disconnect(&self) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.wifi.disconnect().await
    }

    pub fn saved_networks(&self) -> Vec<lanlink_core::SavedNetwork> {
        self.wifi.saved_networks()
    }

    pub fn forget_network(&self, bssid: lanlink_core::Bssid) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.wifi.forget_network(bssid)
    }

    // ------------------------------------------------------------------------
    // Discovery Commands
    // ------------------------------------------------------------------------

    pub fn start_discovery(&self) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        let config = self.config.get();
        self.discovery
            .start((self.discovery_factory)(), &config.discovery);
        Ok(())
    }

    pub fn stop_discovery(&self) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.discovery.stop();
        Ok(())
    }

    pub fn discovered_devices(&self) -> Vec<lanlink_core::DiscoveredDevice> {
        self.discovery.devices()
    }

    // ------------------------------------------------------------------------
    // Sharing Commands
    // ------------------------------------------------------------------------

    pub async fn start_sharing_server(&self, options: ShareServerOptions) -> LanlinkResult<u16> {
        self.ensure_initialized()?;
        self.sharing.start_server(options).await
    }

    pub async fn stop_sharing_server(&self) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.sharing.stop_server().await
    }

    pub async fn share_file(
        &self,
        path: &Path,
        options: ShareFileOptions,
    ) -> LanlinkResult<SharedFileEntry> {
        self.ensure_initialized()?;
        self.sharing.share_file(path, options).await
    }

    pub fn generate_qr_code(&self, id: ShareId) -> LanlinkResult<String> {
        self.ensure_initialized()?;
        self.sharing.generate_qr_code(id)
    }

    pub fn shared_files(&self) -> Vec<SharedFileEntry> {
        self.sharing.shared_files()
    }

    /// Port the sharing server is currently bound to, when running
    pub fn sharing_server_port(&self) -> Option<u16> {
        self.sharing.bound_port()
    }

    // ------------------------------------------------------------------------
    // Transfer Commands
    // ------------------------------------------------------------------------

    pub fn cancel_transfer(&self, id: TransferId) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.transfers.cancel(id)
    }

    pub fn transfer_sessions(&self) -> Vec<lanlink_core::TransferSession> {
        self.transfers.sessions()
    }

    // ------------------------------------------------------------------------
    // Hotspot Commands
    // ------------------------------------------------------------------------

    pub async fn enable_hotspot(&self, overrides: HotspotOverrides) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.hotspot.enable(overrides).await
    }

    pub async fn disable_hotspot(&self) -> LanlinkResult<()> {
        self.ensure_initialized()?;
        self.hotspot.disable().await
    }

    pub fn is_hotspot_enabled(&self) -> bool {
        self.hotspot.is_enabled()
    }

    // ------------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------------

    /// Synchronous aggregation of every component's current state
    pub fn network_statistics(&self) -> NetworkStatistics {
        NetworkStatistics {
            initialized: self.initialized.load(Ordering::SeqCst),
            connectivity: self.connectivity.snapshot(),
            available_network_count: self.wifi.available_networks().len(),
            saved_network_count: self.wifi.saved_networks().len(),
            discovery_running: self.discovery.is_running(),
            discovered_device_count: self.discovery.device_count(),
            sharing_server_running: self.sharing.is_running(),
            shared_file_count: self.sharing.share_count(),
            hotspot_enabled: self.hotspot.is_enabled(),
            transfers: self.transfers.sessions(),
            performance: self
                .performance
                .read()
                .expect("performance snapshot poisoned")
                .clone(),
        }
    }

    /// Current configuration (a clone; replace it via `update_config`)
    pub fn current_config(&self) -> LanlinkConfig {
        self.config.get()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_initialized(&self) -> LanlinkResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(self.fail(LanlinkError::NotInitialized))
        }
    }

    fn start_scheduler(&self, config: &LanlinkConfig) {
        let scheduler = Scheduler::start(
            &config.monitoring,
            &config.discovery,
            Arc::clone(&self.discovery),
            Arc::clone(&self.transfers),
            Arc::clone(&self.metrics),
            Arc::clone(&self.time),
            Arc::clone(&self.performance),
        );
        *self.scheduler.lock().expect("scheduler state poisoned") = Some(scheduler);
    }

    fn stop_scheduler(&self) {
        if let Some(scheduler) = self
            .scheduler
            .lock()
            .expect("scheduler state poisoned")
            .take()
        {
            scheduler.stop();
        }
    }

    fn persist_config(&self) {
        let config = self.config.get();
        match serde_json::to_vec(&config) {
            Ok(bytes) => {
                let mut storage = self.storage.lock().expect("storage poisoned");
                if let Err(e) = storage.store(CONFIG_KEY, bytes) {
                    warn!("failed to persist configuration: {e}");
                }
            }
            Err(e) => warn!("failed to encode configuration: {e}"),
        }
    }

    fn load_persisted_config(&self) -> Option<LanlinkConfig> {
        let bytes = {
            let storage = self.storage.lock().expect("storage poisoned");
            storage.retrieve(CONFIG_KEY).ok().flatten()
        }?;
        match serde_json::from_slice::<LanlinkConfig>(&bytes) {
            Ok(config) if config.validate().is_ok() => Some(config),
            Ok(_) => {
                warn!("persisted configuration no longer valid, ignoring");
                None
            }
            Err(e) => {
                warn!("persisted configuration corrupted, ignoring: {e}");
                None
            }
        }
    }

    fn fail(&self, err: LanlinkError) -> LanlinkError {
        emit(
            &self.events,
            NetworkEvent::Error {
                message: err.to_string(),
            },
        );
        err
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop_scheduler();
    }
}

//! Fake platform implementations
//!
//! Deterministic stand-ins for every platform capability, used by this
//! crate's tests and available to hosts that want to run the engine without
//! real radios (demos, CI, simulators).

use async_trait::async_trait;
use lanlink_core::{
    Bssid, ConnectivityChange, ConnectivitySource, DeviceId, DeviceType, DiscoveredDevice,
    DiscoveryProtocol, HotspotConfig, HotspotPlatform, LanlinkError, LanlinkResult, MetricsProvider,
    Permission, PermissionGate, Timestamp, WifiNetwork, WifiPlatform,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ----------------------------------------------------------------------------
// Fixture Helpers
// ----------------------------------------------------------------------------

/// Build a scan-result fixture; `seq` disambiguates the BSSID
pub fn wifi_network(ssid: &str, seq: u8, signal_strength: i16, capabilities: &str) -> WifiNetwork {
    WifiNetwork::new(
        ssid,
        Bssid::new([0xde, 0xad, 0xbe, 0xef, 0x00, seq]),
        signal_strength,
        2412,
        capabilities,
    )
}

/// Build a discovered-device fixture
pub fn discovered_device(id: &str, ip: &str) -> DiscoveredDevice {
    DiscoveredDevice {
        id: DeviceId::new(id),
        name: format!("device {id}"),
        ip_address: ip.parse().expect("fixture ip"),
        device_type: DeviceType::Desktop,
        last_seen: Timestamp::new(0),
        is_online: true,
        metadata: HashMap::new(),
    }
}

// ----------------------------------------------------------------------------
// Wi-Fi
// ----------------------------------------------------------------------------

/// Scripted Wi-Fi platform returning canned scan results
pub struct FakeWifiPlatform {
    networks: Mutex<Vec<WifiNetwork>>,
    scan_count: AtomicUsize,
    join_count: AtomicUsize,
    fail_join: Mutex<Option<String>>,
    joined: Mutex<Option<String>>,
}

impl FakeWifiPlatform {
    pub fn with_networks(networks: Vec<WifiNetwork>) -> Self {
        Self {
            networks: Mutex::new(networks),
            scan_count: AtomicUsize::new(0),
            join_count: AtomicUsize::new(0),
            fail_join: Mutex::new(None),
            joined: Mutex::new(None),
        }
    }

    /// Make the next join attempt fail with the given reason
    pub fn fail_next_join(&self, reason: &str) {
        *self.fail_join.lock().expect("fake poisoned") = Some(reason.to_string());
    }

    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::SeqCst)
    }

    pub fn join_count(&self) -> usize {
        self.join_count.load(Ordering::SeqCst)
    }

    pub fn joined_ssid(&self) -> Option<String> {
        self.joined.lock().expect("fake poisoned").clone()
    }
}

#[async_trait]
impl WifiPlatform for FakeWifiPlatform {
    async fn trigger_scan(&self) -> LanlinkResult<()> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scan_results(&self) -> LanlinkResult<Vec<WifiNetwork>> {
        Ok(self.networks.lock().expect("fake poisoned").clone())
    }

    async fn join(&self, network: &WifiNetwork, _password: Option<&str>) -> LanlinkResult<()> {
        if let Some(reason) = self.fail_join.lock().expect("fake poisoned").take() {
            return Err(LanlinkError::connection_failed(network.ssid.clone(), reason));
        }
        self.join_count.fetch_add(1, Ordering::SeqCst);
        *self.joined.lock().expect("fake poisoned") = Some(network.ssid.clone());
        Ok(())
    }

    async fn leave(&self) -> LanlinkResult<()> {
        *self.joined.lock().expect("fake poisoned") = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Hotspot
// ----------------------------------------------------------------------------

/// Recording hotspot platform
pub struct FakeHotspotPlatform {
    start_count: AtomicUsize,
    stop_count: AtomicUsize,
    fail_start: Mutex<Option<String>>,
    last_config: Mutex<Option<HotspotConfig>>,
}

impl FakeHotspotPlatform {
    pub fn new() -> Self {
        Self {
            start_count: AtomicUsize::new(0),
            stop_count: AtomicUsize::new(0),
            fail_start: Mutex::new(None),
            last_config: Mutex::new(None),
        }
    }

    pub fn fail_next_start(&self, reason: &str) {
        *self.fail_start.lock().expect("fake poisoned") = Some(reason.to_string());
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<HotspotConfig> {
        self.last_config.lock().expect("fake poisoned").clone()
    }
}

impl Default for FakeHotspotPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HotspotPlatform for FakeHotspotPlatform {
    async fn start_access_point(&self, config: &HotspotConfig) -> LanlinkResult<()> {
        if let Some(reason) = self.fail_start.lock().expect("fake poisoned").take() {
            return Err(LanlinkError::hotspot_failed(reason));
        }
        self.start_count.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().expect("fake poisoned") = Some(config.clone());
        Ok(())
    }

    async fn stop_access_point(&self) -> LanlinkResult<()> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Permissions
// ----------------------------------------------------------------------------

/// Permission gate with a fixed grant set
pub struct StaticPermissionGate {
    granted: HashSet<Permission>,
}

impl StaticPermissionGate {
    pub fn allow_all() -> Self {
        Self {
            granted: Permission::ALL.into_iter().collect(),
        }
    }

    pub fn deny_all() -> Self {
        Self {
            granted: HashSet::new(),
        }
    }

    /// Grant everything except the listed permissions
    pub fn denying(denied: &[Permission]) -> Self {
        Self {
            granted: Permission::ALL
                .into_iter()
                .filter(|p| !denied.contains(p))
                .collect(),
        }
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn request(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}

// ----------------------------------------------------------------------------
// Connectivity
// ----------------------------------------------------------------------------

/// Connectivity source replaying a fixed script, then idling until shutdown
pub struct ScriptedConnectivitySource {
    script: Vec<ConnectivityChange>,
}

impl ScriptedConnectivitySource {
    pub fn new(script: Vec<ConnectivityChange>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl ConnectivitySource for ScriptedConnectivitySource {
    async fn run(
        &mut self,
        changes: mpsc::Sender<ConnectivityChange>,
        shutdown: CancellationToken,
    ) -> LanlinkResult<()> {
        for change in self.script.drain(..) {
            if changes.send(change).await.is_err() {
                return Ok(());
            }
        }
        shutdown.cancelled().await;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Discovery
// ----------------------------------------------------------------------------

/// Discovery protocol forwarding externally pushed batches.
///
/// Returns the push handle and a boxed protocol ready for one discovery run.
pub fn push_discovery_protocol() -> (
    mpsc::Sender<Vec<DiscoveredDevice>>,
    Box<dyn DiscoveryProtocol>,
) {
    let (tx, rx) = mpsc::channel(16);
    (tx, Box::new(PushDiscoveryProtocol { input: Some(rx) }))
}

struct PushDiscoveryProtocol {
    input: Option<mpsc::Receiver<Vec<DiscoveredDevice>>>,
}

#[async_trait]
impl DiscoveryProtocol for PushDiscoveryProtocol {
    async fn run(
        &mut self,
        batches: mpsc::Sender<Vec<DiscoveredDevice>>,
        shutdown: CancellationToken,
    ) -> LanlinkResult<()> {
        let Some(mut input) = self.input.take() else {
            return Err(LanlinkError::discovery_failed("protocol already consumed"));
        };
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                batch = input.recv() => {
                    let Some(batch) = batch else { return Ok(()) };
                    if batches.send(batch).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Metrics
// ----------------------------------------------------------------------------

/// Metrics provider reporting fixed figures
pub struct FixedMetricsProvider {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

impl MetricsProvider for FixedMetricsProvider {
    fn cpu_percent(&self) -> f32 {
        self.cpu_percent
    }

    fn memory_bytes(&self) -> u64 {
        self.memory_bytes
    }
}

//! Shared wiring for the integration suites
#![allow(dead_code)]

use lanlink_core::{
    DiscoveredDevice, LanlinkConfig, ManualTimeSource, MemoryStorage, TimeSource, Timestamp,
};
use lanlink_runtime::testing::{
    push_discovery_protocol, FakeHotspotPlatform, FakeWifiPlatform, ScriptedConnectivitySource,
    StaticPermissionGate,
};
use lanlink_runtime::{Coordinator, DiscoveryProtocolFactory};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Push handles for every discovery run the factory has produced, newest last
pub type BatchSenders = Arc<Mutex<Vec<mpsc::Sender<Vec<DiscoveredDevice>>>>>;

/// Discovery factory that records the push handle of each produced protocol
pub fn recording_discovery_factory() -> (BatchSenders, DiscoveryProtocolFactory) {
    let senders: BatchSenders = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&senders);
    let factory: DiscoveryProtocolFactory = Box::new(move || {
        let (tx, protocol) = push_discovery_protocol();
        recorded.lock().expect("sender list poisoned").push(tx);
        protocol
    });
    (senders, factory)
}

pub struct Fixture {
    pub coordinator: Coordinator,
    pub wifi: Arc<FakeWifiPlatform>,
    pub hotspot: Arc<FakeHotspotPlatform>,
    pub batches: BatchSenders,
    pub time: Arc<ManualTimeSource>,
}

/// One-time log wiring so failing runs can be replayed with output
fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Engine wired with fakes, an allow-all permission gate and a manual clock
pub fn fixture_with(config: LanlinkConfig, networks: Vec<lanlink_core::WifiNetwork>) -> Fixture {
    init_test_logging();
    let wifi = Arc::new(FakeWifiPlatform::with_networks(networks));
    let hotspot = Arc::new(FakeHotspotPlatform::new());
    let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(1_000_000)));
    let (batches, factory) = recording_discovery_factory();

    let coordinator = Coordinator::builder()
        .config(config)
        .wifi_platform(Arc::clone(&wifi) as _)
        .hotspot_platform(Arc::clone(&hotspot) as _)
        .connectivity_source(Box::new(ScriptedConnectivitySource::new(vec![])))
        .discovery_protocol(factory)
        .permissions(Arc::new(StaticPermissionGate::allow_all()))
        .storage(Box::new(MemoryStorage::new()))
        .time(Arc::clone(&time) as Arc<dyn TimeSource>)
        .build()
        .expect("fixture wiring is valid");

    Fixture {
        coordinator,
        wifi,
        hotspot,
        batches,
        time,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(LanlinkConfig::testing(), Vec::new())
}

/// Latest discovery push handle, panicking when discovery never started
pub fn latest_batch_sender(fixture: &Fixture) -> mpsc::Sender<Vec<DiscoveredDevice>> {
    fixture
        .batches
        .lock()
        .expect("sender list poisoned")
        .last()
        .cloned()
        .expect("discovery was never started")
}

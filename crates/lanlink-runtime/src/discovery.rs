//! LAN device discovery
//!
//! Owns the discovered-device registry. The underlying protocol pushes full
//! batches; each batch replaces the registry contents wholesale. A prune
//! command (driven by the Coordinator's scheduler) evicts devices whose
//! `last_seen` exceeds the staleness threshold; LAN discovery protocols have
//! no reliable "device left" signal, so staleness is the only absence
//! detector. Batch application and pruning are serialized through one owning
//! task, so a prune can never resurrect a dropped device or drop a fresh one.

use lanlink_core::{
    emit, DeviceId, DiscoveredDevice, DiscoveryConfig, DiscoveryProtocol, EventSender,
    NetworkEvent, TimeSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Discovery Service
// ----------------------------------------------------------------------------

/// Runs peer discovery and maintains the device registry
pub struct DiscoveryService {
    events: EventSender,
    time: Arc<dyn TimeSource>,
    batch_buffer_size: usize,
    devices: Arc<RwLock<HashMap<DeviceId, DiscoveredDevice>>>,
    running: Arc<AtomicBool>,
    ctrl: Mutex<Option<RunningDiscovery>>,
}

struct RunningDiscovery {
    shutdown: CancellationToken,
    command_tx: mpsc::Sender<DiscoveryCommand>,
    protocol_handle: JoinHandle<()>,
    loop_handle: JoinHandle<()>,
}

enum DiscoveryCommand {
    Prune,
}

impl DiscoveryService {
    pub fn new(events: EventSender, time: Arc<dyn TimeSource>, batch_buffer_size: usize) -> Self {
        Self {
            events,
            time,
            batch_buffer_size,
            devices: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            ctrl: Mutex::new(None),
        }
    }

    /// Start discovery with the given protocol; a no-op when already running
    pub fn start(&self, protocol: Box<dyn DiscoveryProtocol>, config: &DiscoveryConfig) {
        let mut ctrl = self.ctrl.lock().expect("discovery state poisoned");
        if ctrl.is_some() {
            debug!("discovery already running");
            return;
        }

        // A fresh run starts from an empty registry.
        self.devices.write().expect("device registry poisoned").clear();

        let (batch_tx, batch_rx) = mpsc::channel(self.batch_buffer_size);
        let (command_tx, command_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();

        let protocol_handle = spawn_protocol(protocol, batch_tx, shutdown.child_token());
        let loop_handle = spawn_registry_loop(
            Arc::clone(&self.devices),
            self.events.clone(),
            Arc::clone(&self.time),
            config.clone(),
            batch_rx,
            command_rx,
            shutdown.child_token(),
        );

        self.running.store(true, Ordering::SeqCst);
        info!("discovery started");
        emit(&self.events, NetworkEvent::DiscoveryStarted);

        *ctrl = Some(RunningDiscovery {
            shutdown,
            command_tx,
            protocol_handle,
            loop_handle,
        });
    }

    /// Stop discovery; a no-op when not running
    pub fn stop(&self) {
        let mut ctrl = self.ctrl.lock().expect("discovery state poisoned");
        let Some(running) = ctrl.take() else {
            return;
        };

        running.shutdown.cancel();
        running.protocol_handle.abort();
        running.loop_handle.abort();
        self.running.store(false, Ordering::SeqCst);
        info!("discovery stopped");
        emit(&self.events, NetworkEvent::DiscoveryStopped);
    }

    /// Ask the owning task to run a prune sweep; ignored when not running.
    ///
    /// Called by the Coordinator's scheduler rather than an internal timer, so
    /// all periodic work in the engine ticks from one place.
    pub async fn request_prune(&self) {
        let command_tx = {
            let ctrl = self.ctrl.lock().expect("discovery state poisoned");
            ctrl.as_ref().map(|c| c.command_tx.clone())
        };
        if let Some(tx) = command_tx {
            let _ = tx.send(DiscoveryCommand::Prune).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Defensive copy of the device registry
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.devices
            .read()
            .expect("device registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().expect("device registry poisoned").len()
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        if let Some(running) = self.ctrl.lock().ok().and_then(|mut c| c.take()) {
            running.shutdown.cancel();
            running.protocol_handle.abort();
            running.loop_handle.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Worker Tasks
// ----------------------------------------------------------------------------

fn spawn_protocol(
    mut protocol: Box<dyn DiscoveryProtocol>,
    batch_tx: mpsc::Sender<Vec<DiscoveredDevice>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = protocol.run(batch_tx, shutdown).await {
            warn!("discovery protocol stopped: {e}");
        }
    })
}

fn spawn_registry_loop(
    devices: Arc<RwLock<HashMap<DeviceId, DiscoveredDevice>>>,
    events: EventSender,
    time: Arc<dyn TimeSource>,
    config: DiscoveryConfig,
    mut batch_rx: mpsc::Receiver<Vec<DiscoveredDevice>>,
    mut command_rx: mpsc::Receiver<DiscoveryCommand>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                batch = batch_rx.recv() => {
                    let Some(batch) = batch else { break };
                    apply_batch(&devices, &events, &time, batch);
                }
                command = command_rx.recv() => {
                    let Some(DiscoveryCommand::Prune) = command else { break };
                    prune_stale(&devices, &time, &config);
                }
            }
        }
        debug!("discovery registry loop stopped");
    })
}

/// Replace the registry contents with a protocol batch (never merged)
fn apply_batch(
    devices: &Arc<RwLock<HashMap<DeviceId, DiscoveredDevice>>>,
    events: &EventSender,
    time: &Arc<dyn TimeSource>,
    batch: Vec<DiscoveredDevice>,
) {
    let now = time.now();
    let count = batch.len();

    let mut registry = devices.write().expect("device registry poisoned");
    registry.clear();
    for mut device in batch {
        // Stamp arrival time so staleness is measured against our clock, not
        // whatever the remote advertised.
        device.last_seen = now;
        device.is_online = true;
        registry.insert(device.id.clone(), device);
    }
    drop(registry);

    debug!(count, "discovery batch applied");
    emit(events, NetworkEvent::DevicesDiscovered { count });
}

/// Evict devices whose `last_seen` exceeds the staleness threshold
fn prune_stale(
    devices: &Arc<RwLock<HashMap<DeviceId, DiscoveredDevice>>>,
    time: &Arc<dyn TimeSource>,
    config: &DiscoveryConfig,
) {
    let now = time.now();
    let mut registry = devices.write().expect("device registry poisoned");
    let before = registry.len();
    registry.retain(|_, device| !device.is_stale(now, config.staleness_threshold));
    let evicted = before - registry.len();
    if evicted > 0 {
        debug!(evicted, "stale devices pruned");
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{discovered_device, push_discovery_protocol};
    use lanlink_core::{create_event_channel, ChannelConfig, ManualTimeSource, Timestamp};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> DiscoveryConfig {
        DiscoveryConfig {
            prune_interval: Duration::from_millis(100),
            staleness_threshold: Duration::from_secs(300),
        }
    }

    async fn wait_for_count(service: &DiscoveryService, expected: usize) {
        timeout(Duration::from_secs(1), async {
            loop {
                if service.device_count() == expected {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "registry never reached {expected} devices (has {})",
                service.device_count()
            )
        });
    }

    #[tokio::test]
    async fn test_batch_replaces_registry_wholesale() {
        let (events, mut receiver) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let service = DiscoveryService::new(events, time, 16);

        let (pusher, protocol) = push_discovery_protocol();
        service.start(protocol, &test_config());
        assert!(service.is_running());
        assert_eq!(receiver.recv().await.unwrap(), NetworkEvent::DiscoveryStarted);

        pusher
            .send(vec![
                discovered_device("a", "192.168.1.10"),
                discovered_device("b", "192.168.1.11"),
                discovered_device("c", "192.168.1.12"),
            ])
            .await
            .unwrap();
        wait_for_count(&service, 3).await;
        assert_eq!(
            receiver.recv().await.unwrap(),
            NetworkEvent::DevicesDiscovered { count: 3 }
        );

        // The next batch replaces, not merges.
        pusher
            .send(vec![discovered_device("d", "192.168.1.13")])
            .await
            .unwrap();
        wait_for_count(&service, 1).await;
        let devices = service.devices();
        assert_eq!(devices[0].id.as_str(), "d");

        service.stop();
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_prune_evicts_only_stale_devices() {
        let (events, _receiver) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let service = DiscoveryService::new(events, Arc::clone(&time) as _, 16);

        let (pusher, protocol) = push_discovery_protocol();
        service.start(protocol, &test_config());

        pusher
            .send(vec![discovered_device("a", "192.168.1.10")])
            .await
            .unwrap();
        wait_for_count(&service, 1).await;

        // Just inside the threshold: survives.
        time.advance(Duration::from_secs(300));
        service.request_prune().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(service.device_count(), 1);

        // Past the threshold: evicted.
        time.advance(Duration::from_secs(1));
        service.request_prune().await;
        wait_for_count(&service, 0).await;

        service.stop();
    }

    #[tokio::test]
    async fn test_restart_clears_previous_registry() {
        let (events, _receiver) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let service = DiscoveryService::new(events, time, 16);

        let (pusher, protocol) = push_discovery_protocol();
        service.start(protocol, &test_config());
        pusher
            .send(vec![discovered_device("a", "192.168.1.10")])
            .await
            .unwrap();
        wait_for_count(&service, 1).await;
        service.stop();

        let (_pusher2, protocol2) = push_discovery_protocol();
        service.start(protocol2, &test_config());
        assert_eq!(service.device_count(), 0);
        service.stop();
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (events, mut receiver) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let service = DiscoveryService::new(events, time, 16);

        let (_pusher, protocol) = push_discovery_protocol();
        service.start(protocol, &test_config());
        assert_eq!(receiver.recv().await.unwrap(), NetworkEvent::DiscoveryStarted);

        let (_pusher2, protocol2) = push_discovery_protocol();
        service.start(protocol2, &test_config());
        assert!(receiver.try_recv().is_err());

        service.stop();
    }

    #[tokio::test]
    async fn test_prune_when_not_running_is_noop() {
        let (events, _receiver) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(0)));
        let service = DiscoveryService::new(events, time, 16);
        service.request_prune().await;
        assert_eq!(service.device_count(), 0);
    }
}

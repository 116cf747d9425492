//! Connectivity monitoring
//!
//! Consumes OS connectivity-change notifications from the injected
//! [`ConnectivitySource`], resolves a best-effort local IPv4 address, and keeps
//! a snapshot readable synchronously by any caller. Notifications are handled
//! by a single consumer task, so they apply in delivery order.

use lanlink_core::{
    emit, ChannelConfig, ConnectivityChange, ConnectivityKind, ConnectivitySnapshot,
    ConnectivitySource, EventSender, NetworkEvent,
};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Connectivity Monitor
// ----------------------------------------------------------------------------

/// Tracks current connectivity kind, Wi-Fi identity, signal and local address
pub struct ConnectivityMonitor {
    events: EventSender,
    snapshot: Arc<RwLock<ConnectivitySnapshot>>,
    buffer_size: usize,
    running: Mutex<Option<RunningMonitor>>,
}

struct RunningMonitor {
    shutdown: CancellationToken,
    source_handle: JoinHandle<()>,
    consumer_handle: JoinHandle<()>,
}

impl ConnectivityMonitor {
    pub fn new(events: EventSender, channels: &ChannelConfig) -> Self {
        Self {
            events,
            snapshot: Arc::new(RwLock::new(ConnectivitySnapshot::default())),
            buffer_size: channels.connectivity_buffer_size,
            running: Mutex::new(None),
        }
    }

    /// Start consuming change notifications from the platform source.
    ///
    /// Idempotent: a second call while running is ignored.
    pub fn start(&self, mut source: Box<dyn ConnectivitySource>) {
        let mut running = self.running.lock().expect("monitor state poisoned");
        if running.is_some() {
            debug!("connectivity monitor already running");
            return;
        }

        let (tx, mut rx) = mpsc::channel::<ConnectivityChange>(self.buffer_size);
        let shutdown = CancellationToken::new();

        let source_shutdown = shutdown.child_token();
        let source_handle = tokio::spawn(async move {
            if let Err(e) = source.run(tx, source_shutdown).await {
                warn!("connectivity source stopped: {e}");
            }
        });

        let snapshot = Arc::clone(&self.snapshot);
        let events = self.events.clone();
        let consumer_shutdown = shutdown.child_token();
        let consumer_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = consumer_shutdown.cancelled() => break,
                    change = rx.recv() => {
                        let Some(change) = change else { break };
                        apply_change(&snapshot, &events, change);
                    }
                }
            }
            debug!("connectivity consumer stopped");
        });

        info!("connectivity monitoring started");
        *running = Some(RunningMonitor {
            shutdown,
            source_handle,
            consumer_handle,
        });
    }

    /// Stop the monitor, leaving the last snapshot in place
    pub fn stop(&self) {
        let mut running = self.running.lock().expect("monitor state poisoned");
        if let Some(monitor) = running.take() {
            monitor.shutdown.cancel();
            monitor.source_handle.abort();
            monitor.consumer_handle.abort();
            info!("connectivity monitoring stopped");
        }
    }

    /// Synchronous snapshot read; never blocks on I/O
    pub fn snapshot(&self) -> ConnectivitySnapshot {
        self.snapshot.read().expect("snapshot poisoned").clone()
    }

    /// Record a successful Wi-Fi join performed by the engine itself.
    ///
    /// The OS will usually deliver its own change notification as well; this
    /// keeps the snapshot correct in the window before it arrives.
    pub(crate) fn note_wifi_connected(
        &self,
        ssid: &str,
        bssid: lanlink_core::Bssid,
        signal_strength: i16,
    ) {
        let mut snapshot = self.snapshot.write().expect("snapshot poisoned");
        snapshot.kind = ConnectivityKind::Wifi;
        snapshot.ssid = Some(ssid.to_string());
        snapshot.bssid = Some(bssid);
        snapshot.signal_strength = Some(signal_strength);
        snapshot.local_ip = resolve_local_ip();
    }

    /// Record an engine-initiated disconnect
    pub(crate) fn note_disconnected(&self) {
        let mut snapshot = self.snapshot.write().expect("snapshot poisoned");
        *snapshot = ConnectivitySnapshot::default();
    }
}

fn apply_change(
    snapshot: &Arc<RwLock<ConnectivitySnapshot>>,
    events: &EventSender,
    change: ConnectivityChange,
) {
    let kind = change.kind;
    let local_ip = if kind == ConnectivityKind::Offline {
        None
    } else {
        resolve_local_ip()
    };

    {
        let mut current = snapshot.write().expect("snapshot poisoned");
        current.kind = kind;
        current.ssid = change.ssid;
        current.bssid = change.bssid;
        current.signal_strength = change.signal_strength;
        current.local_ip = local_ip;
    }

    debug!(%kind, "connectivity changed");
    emit(events, NetworkEvent::ConnectivityChanged { kind });
}

/// Best-effort local IPv4: first non-loopback, non-link-local interface address
pub(crate) fn resolve_local_ip() -> Option<IpAddr> {
    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(v4)) if !v4.is_loopback() && !v4.is_link_local() => Some(IpAddr::V4(v4)),
        Ok(_) => None,
        Err(e) => {
            debug!("local address lookup failed: {e}");
            None
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Device-hosted access point control
//!
//! Thin state machine over the injected [`HotspotPlatform`]. Hotspot mode and
//! Wi-Fi client mode are treated as mutually exclusive: enabling the access
//! point fails while a client connection is live.

use crate::config_store::ConfigStore;
use crate::wifi::WifiManager;
use lanlink_core::{
    emit, EventSender, HotspotError, HotspotPlatform, LanlinkError, LanlinkResult, NetworkEvent,
    SecurityKind,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

// ----------------------------------------------------------------------------
// Hotspot Controller
// ----------------------------------------------------------------------------

/// Overrides merged into the stored [`HotspotConfig`] on enable
///
/// [`HotspotConfig`]: lanlink_core::HotspotConfig
#[derive(Debug, Clone, Default)]
pub struct HotspotOverrides {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub security: Option<SecurityKind>,
}

/// Enables and disables the device-hosted access point
pub struct HotspotController {
    platform: Arc<dyn HotspotPlatform>,
    events: EventSender,
    config: ConfigStore,
    wifi: Arc<WifiManager>,
    enabled: AtomicBool,
}

impl HotspotController {
    pub fn new(
        platform: Arc<dyn HotspotPlatform>,
        events: EventSender,
        config: ConfigStore,
        wifi: Arc<WifiManager>,
    ) -> Self {
        Self {
            platform,
            events,
            config,
            wifi,
            enabled: AtomicBool::new(false),
        }
    }

    /// Bring the access point up with overrides merged into the stored config
    pub async fn enable(&self, overrides: HotspotOverrides) -> LanlinkResult<()> {
        if self.enabled.load(Ordering::SeqCst) {
            return self.fail(HotspotError::AlreadyEnabled.into());
        }
        if self.wifi.is_connected() {
            return self.fail(HotspotError::ClientModeActive.into());
        }

        let mut merged = self.config.hotspot();
        if let Some(ssid) = overrides.ssid {
            merged.ssid = ssid;
        }
        if let Some(password) = overrides.password {
            merged.password = password;
        }
        if let Some(security) = overrides.security {
            merged.security = security;
        }
        if let Err(reason) = merged.validate() {
            return self.fail(LanlinkError::config_error(reason));
        }

        if let Err(e) = self.platform.start_access_point(&merged).await {
            return self.fail(e);
        }

        self.config.replace_hotspot(merged.clone());
        self.enabled.store(true, Ordering::SeqCst);
        info!(ssid = %merged.ssid, security = %merged.security, "hotspot enabled");
        emit(&self.events, NetworkEvent::HotspotEnabled);
        Ok(())
    }

    /// Tear the access point down; a no-op when not enabled
    pub async fn disable(&self) -> LanlinkResult<()> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.platform.stop_access_point().await {
            return self.fail(e);
        }

        self.enabled.store(false, Ordering::SeqCst);
        info!("hotspot disabled");
        emit(&self.events, NetworkEvent::HotspotDisabled);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn fail(&self, err: LanlinkError) -> LanlinkResult<()> {
        emit(
            &self.events,
            NetworkEvent::Error {
                message: err.to_string(),
            },
        );
        Err(err)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::testing::{
        wifi_network, FakeHotspotPlatform, FakeWifiPlatform, StaticPermissionGate,
    };
    use lanlink_core::{
        create_event_channel, ChannelConfig, LanlinkConfig, ManualTimeSource, MemoryStorage,
        SecureStorage, Timestamp,
    };
    use std::sync::Mutex;

    fn build(
        platform: Arc<FakeHotspotPlatform>,
    ) -> (
        HotspotController,
        Arc<WifiManager>,
        lanlink_core::EventReceiver,
    ) {
        let (events, receiver) = create_event_channel(&ChannelConfig::default());
        let config = ConfigStore::new(LanlinkConfig::testing());
        let connectivity = Arc::new(ConnectivityMonitor::new(
            events.clone(),
            &ChannelConfig::default(),
        ));
        let storage: Arc<Mutex<Box<dyn SecureStorage>>> =
            Arc::new(Mutex::new(Box::new(MemoryStorage::new())));
        let wifi = Arc::new(WifiManager::new(
            Arc::new(FakeWifiPlatform::with_networks(vec![])),
            Arc::new(StaticPermissionGate::allow_all()),
            storage,
            events.clone(),
            Arc::new(ManualTimeSource::starting_at(Timestamp::new(0))),
            config.clone(),
            connectivity,
        ));
        let controller = HotspotController::new(platform, events, config, Arc::clone(&wifi));
        (controller, wifi, receiver)
    }

    #[tokio::test]
    async fn test_enable_then_disable_emits_one_event_each() {
        let platform = Arc::new(FakeHotspotPlatform::new());
        let (controller, _wifi, mut events) = build(Arc::clone(&platform));

        controller.enable(HotspotOverrides::default()).await.unwrap();
        assert!(controller.is_enabled());

        controller.disable().await.unwrap();
        assert!(!controller.is_enabled());

        assert_eq!(events.try_recv().unwrap(), NetworkEvent::HotspotEnabled);
        assert_eq!(events.try_recv().unwrap(), NetworkEvent::HotspotDisabled);
        assert!(events.try_recv().is_err());

        assert_eq!(platform.start_count(), 1);
        assert_eq!(platform.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_disable_when_not_enabled_is_silent_noop() {
        let platform = Arc::new(FakeHotspotPlatform::new());
        let (controller, _wifi, mut events) = build(Arc::clone(&platform));

        controller.disable().await.unwrap();
        assert!(events.try_recv().is_err());
        assert_eq!(platform.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_overrides_are_merged_and_stored() {
        let platform = Arc::new(FakeHotspotPlatform::new());
        let (controller, _wifi, _events) = build(Arc::clone(&platform));

        controller
            .enable(HotspotOverrides {
                ssid: Some("conference".into()),
                password: Some("letmein-please".into()),
                security: Some(SecurityKind::Wpa3),
            })
            .await
            .unwrap();

        let stored = controller.config.hotspot();
        assert_eq!(stored.ssid, "conference");
        assert_eq!(stored.security, SecurityKind::Wpa3);
        assert_eq!(
            platform.last_config().unwrap().password,
            "letmein-please"
        );
    }

    #[tokio::test]
    async fn test_secured_override_without_password_rejected() {
        let platform = Arc::new(FakeHotspotPlatform::new());
        let (controller, _wifi, _events) = build(Arc::clone(&platform));

        let result = controller
            .enable(HotspotOverrides {
                security: Some(SecurityKind::Wpa2),
                ..HotspotOverrides::default()
            })
            .await;
        assert!(matches!(result, Err(LanlinkError::Configuration { .. })));
        assert!(!controller.is_enabled());
        assert_eq!(platform.start_count(), 0);
    }

    #[tokio::test]
    async fn test_mutually_exclusive_with_client_mode() {
        let platform = Arc::new(FakeHotspotPlatform::new());
        let (controller, wifi, _events) = build(Arc::clone(&platform));

        let network = wifi_network("HomeWifi", 1, -40, "[ESS]");
        wifi.connect_to_network(&network, None).await.unwrap();

        let result = controller.enable(HotspotOverrides::default()).await;
        assert!(matches!(
            result,
            Err(LanlinkError::Hotspot(HotspotError::ClientModeActive))
        ));
        assert!(!controller.is_enabled());
    }

    #[tokio::test]
    async fn test_platform_failure_leaves_flag_clear() {
        let platform = Arc::new(FakeHotspotPlatform::new());
        platform.fail_next_start("driver rejected");
        let (controller, _wifi, _events) = build(Arc::clone(&platform));

        let result = controller.enable(HotspotOverrides::default()).await;
        assert!(matches!(
            result,
            Err(LanlinkError::Hotspot(HotspotError::PlatformFailed { .. }))
        ));
        assert!(!controller.is_enabled());
    }
}

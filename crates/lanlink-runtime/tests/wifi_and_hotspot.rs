//! Integration tests for the scan/connect flows and hotspot control

mod common;

use common::fixture_with;
use lanlink_core::{LanlinkConfig, LanlinkError, NetworkEvent, WifiError};
use lanlink_runtime::testing::wifi_network;
use lanlink_runtime::HotspotOverrides;
use std::time::Duration;
use tokio::time::timeout;

async fn drain_until(
    receiver: &mut lanlink_core::EventReceiver,
    stop_at: &NetworkEvent,
) -> Vec<NetworkEvent> {
    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        let done = &event == stop_at;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_scan_returns_networks_sorted_by_signal() -> anyhow::Result<()> {
    let f = fixture_with(
        LanlinkConfig::testing(),
        vec![
            wifi_network("CafeWifi", 2, -70, "[ESS]"),
            wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP][ESS]"),
        ],
    );
    f.coordinator.initialize(None).await?;
    let mut events = f.coordinator.subscribe();

    let networks = f.coordinator.scan_networks().await?;
    assert_eq!(networks.len(), 2);
    assert_eq!(networks[0].ssid, "HomeWifi");
    assert_eq!(networks[0].signal_strength, -40);
    assert_eq!(networks[1].ssid, "CafeWifi");

    let seen = drain_until(&mut events, &NetworkEvent::NetworksScanned { count: 2 }).await;
    assert!(seen.contains(&NetworkEvent::NetworksScanned { count: 2 }));

    f.coordinator.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connect_records_saved_network() -> anyhow::Result<()> {
    let f = fixture_with(LanlinkConfig::testing(), Vec::new());
    f.coordinator.initialize(None).await?;
    let mut events = f.coordinator.subscribe();

    let network = wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP]");
    f.coordinator
        .connect_to_network(&network, Some("secret"))
        .await?;

    let saved = f.coordinator.saved_networks();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].connection_count, 1);
    assert_eq!(f.wifi.joined_ssid().as_deref(), Some("HomeWifi"));

    let seen = drain_until(
        &mut events,
        &NetworkEvent::Connected {
            ssid: "HomeWifi".into(),
        },
    )
    .await;
    assert_eq!(
        seen.first(),
        Some(&NetworkEvent::Connecting {
            ssid: "HomeWifi".into()
        })
    );
    assert!(seen.contains(&NetworkEvent::NetworksSaved { count: 1 }));

    // Statistics see the live connection.
    let stats = f.coordinator.network_statistics();
    assert_eq!(stats.saved_network_count, 1);
    assert_eq!(
        stats.connectivity.ssid.as_deref(),
        Some("HomeWifi"),
        "engine-initiated join updates the live connectivity fields"
    );

    f.coordinator.disconnect().await?;
    assert!(drain_until(&mut events, &NetworkEvent::Disconnected)
        .await
        .contains(&NetworkEvent::Disconnected));

    f.coordinator.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_secure_connect_without_password_fails_cleanly() -> anyhow::Result<()> {
    let f = fixture_with(LanlinkConfig::testing(), Vec::new());
    f.coordinator.initialize(None).await?;

    let network = wifi_network("HomeWifi", 1, -40, "[WPA2-PSK-CCMP]");
    let result = f.coordinator.connect_to_network(&network, None).await;
    assert!(matches!(
        result,
        Err(LanlinkError::Wifi(WifiError::PasswordRequired { .. }))
    ));

    let stats = f.coordinator.network_statistics();
    assert!(!stats.connectivity.is_wifi());
    assert_eq!(stats.saved_network_count, 0);
    assert_eq!(f.wifi.join_count(), 0);

    f.coordinator.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hotspot_roundtrip_emits_exactly_one_event_each() -> anyhow::Result<()> {
    let f = fixture_with(LanlinkConfig::testing(), Vec::new());
    f.coordinator.initialize(None).await?;
    let mut events = f.coordinator.subscribe();

    f.coordinator
        .enable_hotspot(HotspotOverrides::default())
        .await?;
    assert!(f.coordinator.is_hotspot_enabled());

    f.coordinator.disable_hotspot().await?;
    assert!(!f.coordinator.is_hotspot_enabled());

    let seen = drain_until(&mut events, &NetworkEvent::HotspotDisabled).await;
    let enabled_count = seen
        .iter()
        .filter(|e| **e == NetworkEvent::HotspotEnabled)
        .count();
    let disabled_count = seen
        .iter()
        .filter(|e| **e == NetworkEvent::HotspotDisabled)
        .count();
    assert_eq!(enabled_count, 1);
    assert_eq!(disabled_count, 1);

    f.coordinator.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hotspot_and_client_mode_are_mutually_exclusive() -> anyhow::Result<()> {
    let f = fixture_with(LanlinkConfig::testing(), Vec::new());
    f.coordinator.initialize(None).await?;

    // Client connection blocks the hotspot.
    let network = wifi_network("HomeWifi", 1, -40, "[ESS]");
    f.coordinator.connect_to_network(&network, None).await?;
    assert!(f
        .coordinator
        .enable_hotspot(HotspotOverrides::default())
        .await
        .is_err());

    // And the other way around.
    f.coordinator.disconnect().await?;
    f.coordinator
        .enable_hotspot(HotspotOverrides::default())
        .await?;
    let result = f.coordinator.connect_to_network(&network, None).await;
    assert!(matches!(
        result,
        Err(LanlinkError::Wifi(WifiError::ConnectionFailed { .. }))
    ));

    f.coordinator.disable_hotspot().await?;
    f.coordinator.shutdown().await;
    Ok(())
}

//! Central periodic scheduler
//!
//! One task owned by the Coordinator drives every recurring job in the
//! engine: the performance-metrics rebuild and the discovery prune sweep.
//! Components expose tick entry points instead of owning their own timers, so
//! timing is defined in exactly one place.

use crate::discovery::DiscoveryService;
use crate::transfers::TransferSessionManager;
use lanlink_core::{
    DiscoveryConfig, MetricsProvider, MonitoringConfig, PerformanceSnapshot, TimeSource,
};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ----------------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------------

pub(crate) struct Scheduler {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn the scheduler task with the current timing configuration
    pub(crate) fn start(
        monitoring: &MonitoringConfig,
        discovery_config: &DiscoveryConfig,
        discovery: Arc<DiscoveryService>,
        transfers: Arc<TransferSessionManager>,
        metrics: Arc<dyn MetricsProvider>,
        time: Arc<dyn TimeSource>,
        performance: Arc<RwLock<PerformanceSnapshot>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.child_token();
        let metrics_period = monitoring.metrics_interval;
        let prune_period = discovery_config.prune_interval;

        let handle = tokio::spawn(async move {
            let mut metrics_tick = tokio::time::interval(metrics_period);
            let mut prune_tick = tokio::time::interval(prune_period);
            // The first interval tick fires immediately; consume both so the
            // cadence starts one period from now.
            metrics_tick.tick().await;
            prune_tick.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = metrics_tick.tick() => {
                        let snapshot = PerformanceSnapshot {
                            taken_at: time.now(),
                            cpu_percent: metrics.cpu_percent(),
                            memory_bytes: metrics.memory_bytes(),
                            active_transfers: transfers.active_count(),
                            devices_online: discovery.device_count(),
                            aggregate_throughput_bps: transfers.aggregate_throughput_bps(),
                        };
                        *performance.write().expect("performance snapshot poisoned") = snapshot;
                    }
                    _ = prune_tick.tick() => {
                        discovery.request_prune().await;
                    }
                }
            }
            debug!("scheduler stopped");
        });

        Self { shutdown, handle }
    }

    pub(crate) fn stop(self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lanlink_core::{
        create_event_channel, ChannelConfig, ManualTimeSource, NoopMetricsProvider, NetworkConfig,
        Timestamp,
    };
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_metrics_tick_rebuilds_snapshot() {
        let (events, _receiver) = create_event_channel(&ChannelConfig::default());
        let time = Arc::new(ManualTimeSource::starting_at(Timestamp::new(7_000)));
        let discovery = Arc::new(DiscoveryService::new(
            events.clone(),
            Arc::clone(&time) as _,
            16,
        ));
        let transfers = Arc::new(TransferSessionManager::new(
            events,
            Arc::clone(&time) as _,
            &NetworkConfig::default(),
        ));
        let performance = Arc::new(RwLock::new(PerformanceSnapshot::default()));

        let scheduler = Scheduler::start(
            &MonitoringConfig {
                metrics_interval: Duration::from_millis(100),
            },
            &lanlink_core::DiscoveryConfig::default(),
            discovery,
            transfers,
            Arc::new(NoopMetricsProvider),
            Arc::clone(&time) as _,
            Arc::clone(&performance),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;

        let snapshot = performance.read().unwrap().clone();
        assert_eq!(snapshot.taken_at, Timestamp::new(7_000));

        scheduler.stop();
    }
}

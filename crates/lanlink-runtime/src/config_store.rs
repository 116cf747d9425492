//! Shared configuration store
//!
//! Holds the current [`LanlinkConfig`] behind one lock. The config is an
//! immutable value replaced wholesale; components read a clone and never hold
//! the lock across await points. Reinitializing dependents after a replace is
//! the Coordinator's job.

use lanlink_core::{HotspotConfig, LanlinkConfig, NetworkConfig};
use std::sync::{Arc, RwLock};

/// Cheaply cloneable handle to the current configuration
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<LanlinkConfig>>,
}

impl ConfigStore {
    pub fn new(config: LanlinkConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Clone of the full current configuration
    pub fn get(&self) -> LanlinkConfig {
        self.inner.read().expect("config store poisoned").clone()
    }

    /// Clone of the network section
    pub fn network(&self) -> NetworkConfig {
        self.inner
            .read()
            .expect("config store poisoned")
            .network
            .clone()
    }

    /// Clone of the hotspot section
    pub fn hotspot(&self) -> HotspotConfig {
        self.inner
            .read()
            .expect("config store poisoned")
            .hotspot
            .clone()
    }

    /// Replace the configuration wholesale
    pub fn replace(&self, config: LanlinkConfig) {
        *self.inner.write().expect("config store poisoned") = config;
    }

    /// Replace only the hotspot section (merged overrides from enable_hotspot)
    pub fn replace_hotspot(&self, hotspot: HotspotConfig) {
        self.inner.write().expect("config store poisoned").hotspot = hotspot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_is_wholesale() {
        let store = ConfigStore::new(LanlinkConfig::default());
        assert_eq!(store.network().default_port, 8080);

        let mut next = LanlinkConfig::default();
        next.network.default_port = 9000;
        store.replace(next);

        assert_eq!(store.network().default_port, 9000);
    }
}

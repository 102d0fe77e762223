//! Shared handle to the current configuration.
//!
//! A [`ConfigStore`] publishes validated configurations behind an
//! [`ArcSwap`], so readers never block and never see a half-applied reload.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::ConfigError;
use crate::loader::{ConfigLoader, ReadyConfig};
use crate::provenance::Provenance;
use crate::validator::Validator;
use crate::TesseraConfig;

/// Lock-free holder of the active [`TesseraConfig`].
///
/// Cloning the store is cheap and every clone observes the same
/// configuration.
///
/// # Example
///
/// ```
/// use tessera_config::{ConfigLoader, ConfigStore};
///
/// let ready = ConfigLoader::new()
///     .with_override("DB.Default.Database", "idrm")
///     .with_override("DB.Default.Username", "svc")
///     .with_override("Auth.AccessSecret", "0123456789abcdef0123456789abcdef")
///     .load()
///     .unwrap();
///
/// let store = ConfigStore::new(ready);
/// assert_eq!(store.current().server.port.get(), 8888);
/// assert_eq!(store.generation(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<ArcSwap<ConfigSnapshot>>,
}

/// One published configuration with its provenance.
///
/// Readers that need both load a single snapshot, so the pair always
/// belongs to the same publish.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// The configuration.
    pub config: Arc<TesseraConfig>,
    /// Which layer supplied each field of `config`.
    pub provenance: Arc<Provenance>,
    /// How many publishes preceded this one.
    pub generation: u64,
}

impl ConfigStore {
    /// Create a store holding `ready`.
    pub fn new(ready: ReadyConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ConfigSnapshot {
                provenance: Arc::new(ready.provenance().clone()),
                config: ready.into_shared(),
                generation: 0,
            })),
        }
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.inner.load_full()
    }

    /// The active configuration.
    pub fn current(&self) -> Arc<TesseraConfig> {
        Arc::clone(&self.inner.load().config)
    }

    /// Provenance of the active configuration.
    pub fn provenance(&self) -> Arc<Provenance> {
        Arc::clone(&self.inner.load().provenance)
    }

    /// How many times a configuration has been published since creation.
    pub fn generation(&self) -> u64 {
        self.inner.load().generation
    }

    /// Replace the active configuration.
    pub fn publish(&self, ready: ReadyConfig) {
        let provenance = Arc::new(ready.provenance().clone());
        let config = ready.into_shared();
        let previous = self.inner.rcu(|current| ConfigSnapshot {
            config: Arc::clone(&config),
            provenance: Arc::clone(&provenance),
            generation: current.generation + 1,
        });
        tracing::info!(generation = previous.generation + 1, "published configuration");
    }

    /// Run `loader` with the baseline rules and publish the result.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error. The active configuration is
    /// left untouched on failure.
    pub fn reload(&self, loader: ConfigLoader) -> Result<Arc<TesseraConfig>, ConfigError> {
        self.reload_with(loader, &Validator::baseline())
    }

    /// Run `loader` with a custom validator and publish the result.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::reload`].
    pub fn reload_with(
        &self,
        loader: ConfigLoader,
        validator: &Validator,
    ) -> Result<Arc<TesseraConfig>, ConfigError> {
        match loader.load_with(validator) {
            Ok(ready) => {
                let shared = ready.shared();
                self.publish(ready);
                Ok(shared)
            }
            Err(e) => {
                tracing::warn!(
                    generation = self.generation(),
                    error = %e,
                    "reload failed; keeping current configuration"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Layer;

    fn loader() -> ConfigLoader {
        ConfigLoader::new()
            .with_override("DB.Default.Database", "idrm")
            .with_override("DB.Default.Username", "svc")
            .with_override("Auth.AccessSecret", "0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_current_is_shared() {
        let store = ConfigStore::new(loader().load().unwrap());
        let a = store.current();
        let b = store.clone().current();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reload_publishes() {
        let store = ConfigStore::new(loader().load().unwrap());
        let before = store.current();

        let after = store
            .reload(loader().with_override("Server.Port", 9000_i64))
            .unwrap();

        assert_eq!(after.server.port.get(), 9000);
        assert_eq!(store.current().server.port.get(), 9000);
        assert_eq!(store.generation(), 1);
        assert_eq!(store.provenance().layer_of("Server.Port"), Some(Layer::Override));
        // Old readers keep their snapshot.
        assert_eq!(before.server.port.get(), 8888);
    }

    #[test]
    fn test_snapshot_pairs_config_with_its_provenance() {
        let store = ConfigStore::new(loader().load().unwrap());
        store
            .reload(loader().with_env_vars("APP", [("APP__SERVER__PORT", "9100")]))
            .unwrap();
        let held = store.snapshot();

        store
            .reload(loader().with_override("Server.Port", 9200_i64))
            .unwrap();

        assert_eq!(held.generation, 1);
        assert_eq!(held.config.server.port.get(), 9100);
        assert_eq!(held.provenance.layer_of("Server.Port"), Some(Layer::Environment));

        let latest = store.snapshot();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.config.server.port.get(), 9200);
        assert_eq!(latest.provenance.layer_of("Server.Port"), Some(Layer::Override));
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let store = ConfigStore::new(loader().load().unwrap());
        let result = store.reload(loader().with_override("Server.Port", 70000_i64));

        assert!(matches!(result, Err(ConfigError::Rejected(_))));
        assert_eq!(store.current().server.port.get(), 8888);
        assert_eq!(store.generation(), 0);
    }
}

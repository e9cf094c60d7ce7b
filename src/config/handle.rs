//! Published configuration with atomic replacement.
//!
//! Uses `arc-swap` so readers load the current store without locking while the
//! remote channel replaces it. A replacement is fully resolved and validated
//! before the single pointer swap, so readers see either the old store or the
//! new one, never a mix.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::config::catalog::{Catalog, OptionKey};
use crate::config::error::ConfigError;
use crate::config::loader::{load_from_str, RawConfig};
use crate::config::store::ConfigStore;
use crate::config::validation::resolve_update;
use crate::observability::metrics;

/// Shared owner of the current [`ConfigStore`].
pub struct ConfigHandle {
    catalog: Arc<Catalog>,
    current: ArcSwap<ConfigStore>,
    /// Serialises writers; readers never take it.
    update_lock: Mutex<()>,
}

impl ConfigHandle {
    /// Publish the store produced at boot.
    pub fn new(catalog: Arc<Catalog>, store: ConfigStore) -> Self {
        Self {
            catalog,
            current: ArcSwap::from_pointee(store),
            update_lock: Mutex::new(()),
        }
    }

    /// The store as of now. Later updates do not affect the returned snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<ConfigStore> {
        self.current.load_full()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Apply a remote batch given as a configuration document.
    pub fn apply_remote(&self, document: &str) -> Result<Arc<ConfigStore>, ConfigError> {
        let result = load_from_str(document).and_then(|raw| self.swap_in(&raw));
        metrics::record_remote_update(result.is_ok());
        result
    }

    /// Apply a remote batch that has already been parsed.
    pub fn apply_remote_raw(&self, raw: &RawConfig) -> Result<Arc<ConfigStore>, ConfigError> {
        let result = self.swap_in(raw);
        metrics::record_remote_update(result.is_ok());
        result
    }

    fn swap_in(&self, raw: &RawConfig) -> Result<Arc<ConfigStore>, ConfigError> {
        let _guard = self
            .update_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.current.load_full();
        if !current.get_bool(OptionKey::RemoteConfig) {
            warn!("Remote configuration batch refused: remote_config is disabled");
            return Err(ConfigError::RemoteConfigDisabled);
        }

        let (next, touched) = resolve_update(&self.catalog, &current, raw)?;
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));

        let names: Vec<&str> = touched.iter().map(|key| key.name()).collect();
        info!(options = ?names, "Remote configuration applied");
        Ok(next)
    }
}

//! Shared, hot-reloadable cluster configuration.
//!
//! The reconcile loop reads the obsolete CPU model set at the start of every
//! cycle and subscribes to changes so a configuration update triggers an
//! immediate relabel instead of waiting for the next resync tick.

use crate::obsolete::ObsoleteModelSet;
use crate::resolve::{load_config_file, ConfigError};
use crate::validate::validate_config;
use std::path::Path;
use tokio::sync::watch;
use tracing::{debug, info};

/// Cluster-level settings consumed by the labeller.
#[derive(Debug)]
pub struct ClusterConfig {
    obsolete_models: watch::Sender<ObsoleteModelSet>,
}

impl ClusterConfig {
    pub fn new(obsolete_models: ObsoleteModelSet) -> Self {
        let (tx, _rx) = watch::channel(obsolete_models);
        Self {
            obsolete_models: tx,
        }
    }

    /// Current obsolete CPU model set.
    pub fn obsolete_models(&self) -> ObsoleteModelSet {
        self.obsolete_models.borrow().clone()
    }

    /// Replace the obsolete set. Subscribers are notified only when the set
    /// actually changed; returns whether it did.
    pub fn update_obsolete_models(&self, models: ObsoleteModelSet) -> bool {
        let changed = self.obsolete_models.send_if_modified(|current| {
            if *current == models {
                false
            } else {
                *current = models;
                true
            }
        });
        if changed {
            info!("obsolete CPU model set changed");
        } else {
            debug!("obsolete CPU model set unchanged");
        }
        changed
    }

    /// Receiver that resolves `changed()` after every effective update.
    pub fn subscribe(&self) -> watch::Receiver<ObsoleteModelSet> {
        self.obsolete_models.subscribe()
    }

    /// Re-read `path` and apply its obsolete model list.
    pub fn reload_from(&self, path: &Path) -> Result<bool, ConfigError> {
        let config = load_config_file(path)?;
        validate_config(&config)?;
        Ok(self.update_obsolete_models(config.obsolete_cpu_models))
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new(ObsoleteModelSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_update_notifies_subscribers() {
        let config = ClusterConfig::new(ObsoleteModelSet::empty());
        let mut rx = config.subscribe();

        assert!(config.update_obsolete_models(ObsoleteModelSet::from_models(["Penryn"])));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_obsolete("Penryn"));
        assert!(config.obsolete_models().is_obsolete("Penryn"));
    }

    #[tokio::test]
    async fn test_identical_update_is_silent() {
        let config = ClusterConfig::new(ObsoleteModelSet::from_models(["A"]));
        let rx = config.subscribe();

        assert!(!config.update_obsolete_models(ObsoleteModelSet::from_models(["A"])));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_reload_from_file() {
        let config = ClusterConfig::new(ObsoleteModelSet::empty());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[obsolete_cpu_models]\nNehalem = true").unwrap();

        assert!(config.reload_from(file.path()).unwrap());
        assert!(config.obsolete_models().is_obsolete("Nehalem"));
        assert!(!config.reload_from(file.path()).unwrap());
    }
}

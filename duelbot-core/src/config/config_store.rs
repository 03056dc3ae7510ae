//! Versioned config holder with change notification.
//!
//! The reaper holds a [`ConfigWatcher`] so a SIGHUP reload takes effect on
//! its next sweep instead of after a restart.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Shared configuration value plus a version channel.
///
/// Every [`update`](ConfigStore::update) bumps the version; watchers wake on
/// the bump and re-read with [`snapshot`](ConfigStore::snapshot).
pub struct ConfigStore<T> {
    value: Arc<RwLock<T>>,
    version_tx: Arc<watch::Sender<u64>>,
}

/// Handle that waits for the next [`ConfigStore`] update.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T: Clone> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            value: Arc::new(RwLock::new(initial)),
            version_tx: Arc::new(version_tx),
        }
    }

    /// Replace the stored value and wake every watcher.
    pub async fn update(&self, value: T) {
        *self.value.write().await = value;
        // The write guard is gone before watchers are woken, so they never
        // block on it.
        self.version_tx.send_modify(|version| *version += 1);
    }

    /// Copy out the current value.
    pub async fn snapshot(&self) -> T {
        self.value.read().await.clone()
    }

    /// Number of updates applied since creation.
    pub fn version(&self) -> u64 {
        *self.version_tx.borrow()
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.version_tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            version_tx: Arc::clone(&self.version_tx),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the store is updated.
    ///
    /// Returns `Err` once every [`ConfigStore`] handle has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}

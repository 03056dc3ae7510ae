//! DuelReaper processor.
//!
//! Periodically sends `ExpireDuels` to the engine so that duels nobody
//! answers, or that stall waiting for weapons, are cancelled and refunded.
//! The sweep interval is re-read whenever the duel config is reloaded.

use kanau::processor::Processor;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info};

use super::duel_engine::{DuelEngine, ExpireDuels};
use crate::config::ConfigWatcher;

/// Background sweeper for expired duels.
pub struct DuelReaper {
    engine: Arc<DuelEngine>,
}

impl DuelReaper {
    pub fn new(engine: Arc<DuelEngine>) -> Self {
        Self { engine }
    }

    /// Run until shutdown is signaled.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut config_watcher: ConfigWatcher,
    ) {
        let mut interval = self.engine.config().snapshot().await.sweep_interval;
        info!(interval_ms = interval.as_millis() as u64, "DuelReaper started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("DuelReaper received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    interval = self.engine.config().snapshot().await.sweep_interval;
                    info!(interval_ms = interval.as_millis() as u64, "DuelReaper picked up new config");
                }

                _ = tokio::time::sleep(interval) => {
                    let now = OffsetDateTime::now_utc();
                    let Ok(expired) = self.engine.process(ExpireDuels { now }).await;
                    if !expired.is_empty() {
                        info!(count = expired.len(), "Expired duels cancelled");
                    } else {
                        debug!("No expired duels");
                    }
                }
            }
        }

        info!("DuelReaper shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, DuelConfig};
    use crate::events::EventRegistry;
    use crate::gateways::MemoryLedger;
    use crate::processors::StartDuel;
    use crate::test_support::RecordingChat;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reaper_cancels_unanswered_duel() {
        let config = ConfigStore::new(DuelConfig {
            open_ttl: time::Duration::ZERO,
            sweep_interval: Duration::from_millis(10),
            ..DuelConfig::default()
        });
        let engine = Arc::new(DuelEngine::new(
            EventRegistry::new(),
            Arc::new(MemoryLedger::new(100)),
            Arc::new(RecordingChat::default()),
            config.clone(),
        ));
        engine
            .process(StartDuel {
                channel: "streamer".to_string(),
                initiator: "alice".into(),
                target: None,
                wager: 10,
            })
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper = DuelReaper::new(engine.clone());
        let handle = tokio::spawn(reaper.run(shutdown_rx, config.subscribe()));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !engine.registry().is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

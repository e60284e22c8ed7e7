//! Crawl loop: keep outbound slots busy and the book on disk.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::wait_for_stop;
use crate::domain::{PexEngine, SwitchError};
use crate::ports::Dialer;

/// Periodically dials addresses picked by the exchange engine.
pub struct Crawler {
    engine: Arc<PexEngine>,
    dialer: Arc<dyn Dialer>,
}

impl Crawler {
    /// Create a crawler feeding `dialer` from `engine`.
    pub fn new(engine: Arc<PexEngine>, dialer: Arc<dyn Dialer>) -> Self {
        Self { engine, dialer }
    }

    /// Run one round: pick up to one target per free outbound slot and dial
    /// them concurrently. Returns the number of successful dials.
    pub async fn crawl_round(&self) -> usize {
        let free = self.dialer.free_outbound_slots();
        let busy = self.dialer.busy_ids();
        let targets = self.engine.dial_targets(free, &busy);
        if targets.is_empty() {
            return 0;
        }
        debug!(count = targets.len(), free, book_size = self.engine.book().size(), "Crawling");

        let mut dials = JoinSet::new();
        for target in targets {
            self.engine.on_dial_attempt(&target);
            let dialer = Arc::clone(&self.dialer);
            dials.spawn(async move {
                let result = dialer.dial(target.clone()).await;
                (target, result)
            });
        }

        let mut connected = 0;
        while let Some(joined) = dials.join_next().await {
            let Ok((target, result)) = joined else {
                continue;
            };
            match result {
                Ok(()) => connected += 1,
                Err(e @ (SwitchError::Dial(_) | SwitchError::Resolve { .. })) => {
                    debug!(%target, error = %e, "Dial failed");
                    self.engine.on_dial_failed(&target);
                }
                Err(e) => debug!(%target, error = %e, "Dial skipped"),
            }
        }
        connected
    }

    /// Crawl every `crawl_period` and flush the book every `save_interval`
    /// until `shutdown` turns true. The first round runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let config = self.engine.config().clone();
        let mut crawl = interval(config.crawl_period);
        crawl.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut flush = tokio::time::interval_at(Instant::now() + config.save_interval, config.save_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = ?config.crawl_period, seeds = self.engine.seeds().len(), "Crawler started");
        loop {
            tokio::select! {
                _ = wait_for_stop(&mut shutdown) => break,
                _ = crawl.tick() => {
                    // Shutdown cancels a round in flight, aborting its dials.
                    tokio::select! {
                        _ = wait_for_stop(&mut shutdown) => break,
                        connected = self.crawl_round() => {
                            if connected > 0 {
                                debug!(connected, "Crawl round finished");
                            }
                        }
                    }
                }
                _ = flush.tick() => {
                    let book = Arc::clone(self.engine.book());
                    match tokio::task::spawn_blocking(move || book.save()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %e, "Periodic address book save failed"),
                        Err(e) => warn!(error = %e, "Address book save task failed"),
                    }
                }
            }
        }
        info!("Crawler stopped");
    }
}

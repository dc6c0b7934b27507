use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::error::SchedulerError;
use crate::service::{RankingService, RefreshOutcome};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct SchedulerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop. An episode already in flight is allowed to finish first.
    pub async fn stop(self) -> Result<(), SchedulerError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(SchedulerError::from)
    }
}

/// Refreshes the ranking after `initial_delay`, then once per `interval`.
pub fn spawn_scheduler(service: Arc<RankingService>, config: RefreshConfig) -> SchedulerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + config.initial_delay();
        let mut ticker = tokio::time::interval_at(start, config.interval().max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("scheduler shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    match service.refresh().await {
                        RefreshOutcome::Refreshed { posts } => debug!(posts, "scheduled refresh done"),
                        RefreshOutcome::AlreadyRunning => debug!("refresh already running, skipping tick"),
                        RefreshOutcome::Failed(err) => warn!(error = %err, "scheduled refresh failed"),
                    }
                }
            }
        }
    });

    SchedulerHandle { cancel_tx, join }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::MemoryBroker;

/// Periodically drops terminal records so a long-lived [`MemoryBroker`]
/// does not grow without bound
pub struct RecordReaper {
    broker: Arc<MemoryBroker>,
    retention: Duration,
    interval: Duration,
}

impl RecordReaper {
    /// Keep finished records for `retention`, sweeping once a minute
    pub fn new(broker: Arc<MemoryBroker>, retention: Duration) -> Self {
        Self {
            broker,
            retention,
            interval: Duration::from_secs(60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweep until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        info!(
            retention_ms = self.retention.as_millis() as u64,
            interval_ms = self.interval.as_millis() as u64,
            "record reaper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.reap_once();
                    if removed > 0 {
                        info!(removed, "pruned finished job records");
                    } else {
                        debug!("no finished job records to prune");
                    }
                }
            }
        }

        debug!("record reaper stopped");
    }

    /// Run one sweep
    pub fn reap_once(&self) -> usize {
        // A retention too large for chrono keeps everything
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return 0;
        };
        match Utc::now().checked_sub_signed(retention) {
            Some(cutoff) => self.broker.prune_terminal(cutoff),
            None => 0,
        }
    }
}

// Poller
// Re-runs migration batches on a fixed interval, carrying the watermark forward

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::connector::CrmConnector;
use super::sync::{SyncEngine, SyncError, SyncReport};
use crate::core::Timestamp;

/// Periodic driver around a [`SyncEngine`]
pub struct Poller {
    engine: SyncEngine,
    source: Arc<dyn CrmConnector>,
    destination: Arc<dyn CrmConnector>,
    interval: Duration,
    watermark: Option<Timestamp>,
}

impl Poller {
    pub fn new(
        engine: SyncEngine,
        source: Arc<dyn CrmConnector>,
        destination: Arc<dyn CrmConnector>,
        interval: Duration,
    ) -> Self {
        // tokio intervals cannot tick at zero
        let interval = interval.max(Duration::from_millis(1));
        Self {
            engine,
            source,
            destination,
            interval,
            watermark: None,
        }
    }

    /// Start from a known watermark instead of a full fetch
    pub fn with_watermark(mut self, watermark: Option<Timestamp>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn watermark(&self) -> Option<Timestamp> {
        self.watermark
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one batch from the current watermark; the watermark only moves forward
    pub async fn run_once(&mut self) -> Result<SyncReport, SyncError> {
        let report = self
            .engine
            .run_batch(self.source.as_ref(), self.destination.as_ref(), self.watermark)
            .await?;

        self.watermark = self.watermark.max(report.watermark);
        Ok(report)
    }

    /// Poll until `shutdown` resolves, returning the last watermark.
    ///
    /// The first batch runs immediately. A failed batch is logged and the
    /// same window is retried on the next tick. A batch in progress is
    /// allowed to finish before shutting down.
    pub async fn run<F>(&mut self, shutdown: F) -> Option<Timestamp>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "polling started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        warn!(error = %err, "batch failed, retrying on next tick");
                    }
                }
            }
        }

        info!(watermark = ?self.watermark.map(|w| w.to_string()), "polling stopped");
        self.watermark
    }
}

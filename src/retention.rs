//! # Retention Sweep
//!
//! Background task that prunes availability telemetry events older than the
//! configured maximum age. Virus and communication events are never pruned.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use metrics::histogram;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::config::RetentionConfig;
use crate::ingest::{EventIngest, IngestError};

pub struct RetentionSweeper {
    config: Arc<RetentionConfig>,
    ingest: EventIngest,
}

impl RetentionSweeper {
    pub fn new(config: Arc<RetentionConfig>, ingest: EventIngest) -> Self {
        Self { config, ingest }
    }

    /// Run the sweep loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            tick_interval_seconds = self.config.tick_interval_seconds,
            max_age_seconds = self.config.max_age_seconds,
            "Starting retention sweeper"
        );
        let tick_interval = self.config.tick_interval();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Retention sweeper shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let started = Instant::now();
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "Retention sweep failed");
                    }
                    histogram!("retention_sweep_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Retention sweeper stopped");
    }

    /// One sweep: delete availability events older than `now - max_age`.
    pub async fn tick(&self) -> Result<u64, IngestError> {
        let max_age = TimeDelta::from_std(self.config.max_age()).unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.ingest.delete_before_time(cutoff).await
    }
}

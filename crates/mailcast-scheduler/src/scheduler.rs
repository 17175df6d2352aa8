//! Poll loop

use crate::config::SchedulerConfig;
use anyhow::Result;
use chrono::Utc;
use mailcast_runtime::{FileBackend, Transport};
use mailcast_sdk::{NewsletterEngine, NewsletterEngineBuilder, TickReport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Build the engine described by the configuration
pub async fn build_engine(
    config: &SchedulerConfig,
    transport: Arc<dyn Transport>,
) -> Result<NewsletterEngine> {
    let mut builder = NewsletterEngineBuilder::new()
        .with_config(config.engine.clone())
        .with_repository(&config.repository_path)
        .with_transport(transport);

    match &config.suppression_file {
        Some(path) => {
            let backend = FileBackend::open(path).await?;
            info!(path = %path.display(), "Using file suppression registry");
            builder = builder.with_suppression_backend(Arc::new(backend));
        }
        None => warn!("No suppression_file configured, suppressions will not survive a restart"),
    }

    Ok(builder.build().await?)
}

/// Runs [`NewsletterEngine::process_due`] on a fixed interval
pub struct Scheduler {
    engine: NewsletterEngine,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: NewsletterEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub fn engine(&self) -> &NewsletterEngine {
        &self.engine
    }

    /// Process everything due now, then drop expired suppressions
    ///
    /// Failures are logged; the next poll tries again.
    pub async fn tick(&self) -> Option<TickReport> {
        let now = Utc::now();
        let report = match self.engine.process_due(now).await {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(
                        campaign_id = failure.campaign_id,
                        message = %failure.message,
                        "Campaign dispatch failed"
                    );
                }
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Tick failed");
                None
            }
        };

        match self.engine.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Expired suppressions removed"),
            Err(e) => warn!(error = %e, "Failed to purge expired suppressions"),
        }
        report
    }

    /// Poll until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
    }
}

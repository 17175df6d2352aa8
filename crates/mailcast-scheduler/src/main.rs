//! Mailcast scheduler binary
//!
//! Dispatches due and recurring campaigns every poll interval.

use anyhow::Result;
use mailcast_scheduler::{build_engine, LogFormat, LoggingTransport, Scheduler, SchedulerConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = SchedulerConfig::load()?;

    // Initialize tracing
    init_tracing(&config)?;
    info!("Loaded configuration: {:?}", config);

    let engine = build_engine(&config, Arc::new(LoggingTransport)).await?;
    info!("Newsletter engine initialized");

    let scheduler = Scheduler::new(engine, config.poll_interval());
    if config.run_once {
        if let Some(report) = scheduler.tick().await {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(());
    }

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await;

    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(config: &SchedulerConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "mailcast_scheduler={level},mailcast_sdk={level},mailcast_runtime={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

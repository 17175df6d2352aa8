//! Scheduler configuration

use mailcast_sdk::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between polls (15 minutes by default)
    pub poll_interval_secs: u64,

    /// Repository holding segments, campaigns and the member snapshot
    pub repository_path: PathBuf,

    /// Suppression registry file; in-memory when unset
    pub suppression_file: Option<PathBuf>,

    /// Filter used when `RUST_LOG` is not set
    pub log_level: String,

    pub log_format: LogFormat,

    /// Process one tick and exit
    pub run_once: bool,

    pub engine: EngineConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 900,
            repository_path: PathBuf::from("repository"),
            suppression_file: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            run_once: false,
            engine: EngineConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from `config/scheduler.*` and `MAILCAST_*`
    /// environment variables
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if exists
        dotenvy::dotenv().ok();
        Self::load_from("config/scheduler")
    }

    /// Load configuration from a file (extension optional) layered under the
    /// environment
    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("MAILCAST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize config: {}", e))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        self.engine.validate()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

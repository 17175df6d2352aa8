//! Configuration types for NewsletterEngine

use mailcast_runtime::suppression::DEFAULT_SOFT_BOUNCE_THRESHOLD;
use mailcast_runtime::DispatcherConfig;
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Soft bounces before an address is suppressed
    pub soft_bounce_threshold: u32,

    /// Sends in flight at once
    pub max_concurrent_sends: usize,

    /// Delivery records handed to the transport per batch
    pub send_batch_size: usize,

    /// Days to wait after a send before resending to non-openers
    pub resend_wait_days: i64,

    /// Threads for segment evaluation; 1 disables threading
    pub evaluation_parallelism: usize,

    /// Member count below which segment evaluation stays on one thread
    pub parallel_threshold: usize,

    /// Prefix for resend subjects when none is given
    pub resend_subject_prefix: String,
}

impl EngineConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            soft_bounce_threshold: DEFAULT_SOFT_BOUNCE_THRESHOLD,
            max_concurrent_sends: dispatcher.max_concurrent_sends,
            send_batch_size: dispatcher.send_batch_size,
            resend_wait_days: 3,
            evaluation_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            parallel_threshold: dispatcher.parallel_threshold,
            resend_subject_prefix: "Reminder: ".to_string(),
        }
    }

    /// Parse a configuration from YAML; missing keys keep their defaults
    pub fn from_yaml(content: &str) -> crate::Result<Self> {
        serde_yaml::from_str(content).map_err(|e| crate::SdkError::ConfigError(e.to_string()))
    }

    pub fn with_soft_bounce_threshold(mut self, threshold: u32) -> Self {
        self.soft_bounce_threshold = threshold;
        self
    }

    pub fn with_max_concurrent_sends(mut self, sends: usize) -> Self {
        self.max_concurrent_sends = sends;
        self
    }

    pub fn with_send_batch_size(mut self, size: usize) -> Self {
        self.send_batch_size = size;
        self
    }

    pub fn with_resend_wait_days(mut self, days: i64) -> Self {
        self.resend_wait_days = days;
        self
    }

    pub fn with_evaluation_parallelism(mut self, threads: usize) -> Self {
        self.evaluation_parallelism = threads;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_resend_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resend_subject_prefix = prefix.into();
        self
    }

    /// Validate settings that have no sensible zero value
    pub fn validate(&self) -> crate::Result<()> {
        if self.soft_bounce_threshold == 0 {
            return Err(crate::SdkError::ConfigError(
                "soft_bounce_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_sends == 0 || self.send_batch_size == 0 {
            return Err(crate::SdkError::ConfigError(
                "max_concurrent_sends and send_batch_size must be at least 1".to_string(),
            ));
        }
        if self.resend_wait_days < 0 {
            return Err(crate::SdkError::ConfigError(
                "resend_wait_days cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent_sends: self.max_concurrent_sends,
            send_batch_size: self.send_batch_size,
            evaluation_parallelism: self.evaluation_parallelism.max(1),
            parallel_threshold: self.parallel_threshold,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.soft_bounce_threshold, 3);
        assert_eq!(config.max_concurrent_sends, 8);
        assert_eq!(config.send_batch_size, 50);
        assert_eq!(config.resend_wait_days, 3);
        assert_eq!(config.parallel_threshold, 2048);
        assert_eq!(config.resend_subject_prefix, "Reminder: ");
        assert!(config.evaluation_parallelism >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml("soft_bounce_threshold: 5\nsend_batch_size: 10\n").unwrap();
        assert_eq!(config.soft_bounce_threshold, 5);
        assert_eq!(config.send_batch_size, 10);
        assert_eq!(config.max_concurrent_sends, 8);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = EngineConfig::new().with_soft_bounce_threshold(0);
        assert!(config.validate().is_err());
    }
}

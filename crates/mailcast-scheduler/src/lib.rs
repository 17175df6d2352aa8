//! Mailcast scheduler
//!
//! Polls the engine for due campaigns on a fixed interval.

pub mod config;
pub mod scheduler;
pub mod transport;

pub use config::{LogFormat, SchedulerConfig};
pub use scheduler::{build_engine, Scheduler};
pub use transport::LoggingTransport;

#![forbid(unsafe_code)]

mod manager;

pub use manager::{HealthStatus, MonitoringManager};

use crate::sensing::ProcessInfo;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One point-in-time capture of all OS processes. Owned by the manager and
/// handed to subscribers by shared reference; subscribers must not mutate it.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub processes: Vec<ProcessInfo>,
    pub timestamp: SystemTime,
}

/// A consumer of process snapshots registered with the [`MonitoringManager`].
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle one snapshot. Called in registration order, once per tick.
    async fn on_snapshot(&self, snapshot: &ProcessSnapshot);

    /// Drop any in-memory state after a history wipe. Stateless subscribers
    /// keep the default no-op.
    async fn reset(&self) {}
}

/// Scheduling and supervision knobs for the manager.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    pub restart_delay: Duration,
    pub restart_max_retries: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            restart_delay: Duration::from_secs(5),
            restart_max_retries: 3,
        }
    }
}

impl From<&config::Engine> for MonitorOptions {
    fn from(engine: &config::Engine) -> Self {
        Self {
            poll_interval: engine.poll_interval,
            restart_delay: engine.restart_delay,
            restart_max_retries: engine.restart_max_retries,
        }
    }
}

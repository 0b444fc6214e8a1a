use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Engine {
    /// How often the monitoring loop captures a process snapshot and fans it
    /// out to subscribers. **Measured in seconds.**
    ///
    /// # Note
    ///
    /// Detection is poll-based: a process whose entire lifetime falls inside
    /// one interval is never observed. Lowering this below one second mostly
    /// buys CPU churn, not accuracy, because the process source caches
    /// snapshots for a short window anyway.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub poll_interval: Duration,

    /// Backoff before the supervisor relaunches the monitoring loop after an
    /// unrecovered fault. **Measured in seconds.**
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub restart_delay: Duration,

    /// How many consecutive unrecovered loop faults are tolerated before
    /// monitoring is halted permanently. A successful tick resets the count.
    pub restart_max_retries: u32,

    /// How long a captured process snapshot stays valid for high-frequency
    /// callers of the cached process source. **Measured in milliseconds.**
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub source_cache_ttl: Duration,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            restart_delay: Duration::from_secs(5),
            restart_max_retries: 3,
            source_cache_ttl: Duration::from_millis(500),
        }
    }
}

#![forbid(unsafe_code)]

mod sqlite;

pub use sqlite::SqliteRepository;

use crate::error::Error;
use async_trait::async_trait;
use serde::Serialize;

/// A session the repository believes is still open (no recorded end time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub key: String,
    pub name: String,
}

/// Per-application usage aggregate over a time window.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppUsage {
    pub name: String,
    pub total_seconds: i64,
    pub launches: i64,
}

/// The app-event history store. Called once per process transition per tick,
/// so implementations must tolerate high call frequency.
#[async_trait]
pub trait AppEventRepository: Send + Sync {
    /// Record the start of a logical application session.
    async fn log_app_event(
        &self,
        name: &str,
        pid: u32,
        parent: &str,
        exe_path: &str,
        start_time: i64,
        unique_key: &str,
    ) -> Result<(), Error>;

    /// Record the end of the session opened under `unique_key`.
    async fn close_app_event(&self, unique_key: &str, end_time: i64) -> Result<(), Error>;

    /// All sessions with no recorded end time.
    async fn get_active_sessions(&self) -> Result<Vec<ActiveSession>, Error>;

    /// Per-app usage over the window, most-used first. Open sessions are
    /// clamped to `until`.
    async fn app_leaderboard(&self, since: i64, until: i64) -> Result<Vec<AppUsage>, Error>;

    /// Total seconds of logged app usage over the window.
    async fn total_screen_time(&self, since: i64, until: i64) -> Result<i64, Error>;

    /// Wipe the entire event history.
    async fn clear_history(&self) -> Result<(), Error>;
}

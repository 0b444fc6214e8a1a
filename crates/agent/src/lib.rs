#![forbid(unsafe_code)]

pub mod api;
pub mod blocklist;
pub mod error;
pub mod ipc;
pub mod monitor;
pub mod persistence;
pub mod sensing;
pub mod session;

pub use api::{ApiServer, ApiServices, PasswordVerifier, StoredHashVerifier};
pub use blocklist::{BlocklistEnforcer, BlocklistStore, JsonBlocklistStore};
pub use error::Error;
pub use ipc::{IpcServer, Request, Response};
pub use monitor::{
    HealthStatus, MonitorOptions, MonitoringManager, ProcessSnapshot, Subscriber,
    DEFAULT_POLL_INTERVAL,
};
pub use persistence::{ActiveSession, AppEventRepository, AppUsage, SqliteRepository};
pub use sensing::{
    CachedProcessSource, ProcessFilter, ProcessInfo, ProcessKiller, ProcessSource, SysinfoKiller,
    SysinfoSource, WindowsRuleFilter,
};
pub use session::SessionTracker;

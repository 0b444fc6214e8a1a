#![forbid(unsafe_code)]

mod cached;
mod filter;
mod sysinfo_source;

pub use cached::CachedProcessSource;
pub use filter::{ProcessFilter, WindowsRuleFilter};
pub use sysinfo_source::{SysinfoKiller, SysinfoSource};

use crate::error::Error;

/// Point-in-time description of one OS process. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub parent_pid: u32,
    pub exe_path: String,
    /// Process creation time in seconds since the epoch; zero when the OS
    /// would not disclose it.
    pub start_time: u64,
}

impl ProcessInfo {
    /// Stable per-lifetime identity. Pids are recycled by the OS, so the key
    /// folds in the creation time to keep two lifetimes on the same pid apart.
    pub fn unique_key(&self) -> String {
        format!("{}:{}", self.pid, self.start_time)
    }
}

pub trait ProcessSource: Send + Sync {
    /// Capture the current list of OS processes.
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, Error>;
}

pub trait ProcessKiller: Send + Sync {
    /// Terminate the process with the given pid. Succeeds silently when the
    /// process is already gone.
    fn kill(&self, pid: u32) -> Result<(), Error>;
}

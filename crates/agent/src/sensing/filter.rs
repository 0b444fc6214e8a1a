#![forbid(unsafe_code)]

use crate::sensing::ProcessInfo;

/// Pure classification predicates evaluated once per process per tick.
pub trait ProcessFilter: Send + Sync {
    /// True for processes that must never be logged: OS plumbing and the
    /// agent itself. Excluded processes are still tracked for end detection.
    fn should_exclude(&self, exe_path: &str, process: &ProcessInfo) -> bool;

    /// True for processes worth opening an application session for.
    fn should_track(&self, exe_path: &str, process: &ProcessInfo) -> bool;
}

/// Path-heuristic filter for Windows hosts.
#[derive(Debug, Clone)]
pub struct WindowsRuleFilter {
    /// Lowercased substrings of the agent's own executables.
    self_markers: Vec<String>,
}

impl WindowsRuleFilter {
    pub fn new() -> Self {
        Self {
            self_markers: vec!["appwarden".to_string()],
        }
    }

    pub fn with_self_markers(markers: Vec<String>) -> Self {
        Self {
            self_markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

impl Default for WindowsRuleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessFilter for WindowsRuleFilter {
    fn should_exclude(&self, exe_path: &str, _process: &ProcessInfo) -> bool {
        let path = exe_path.to_lowercase();

        if self.self_markers.iter().any(|m| path.contains(m)) {
            return true;
        }

        if path.ends_with("conhost.exe") {
            return true;
        }

        path.contains(r"\windows\system32\") || path.contains(r"\windows\syswow64\")
    }

    fn should_track(&self, exe_path: &str, process: &ProcessInfo) -> bool {
        if process.name.is_empty() || exe_path.is_empty() {
            return false;
        }
        // Anything else under the Windows directory is OS machinery that the
        // exclusion rules above did not already catch.
        !exe_path.to_lowercase().contains(r"\windows\")
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Storage {
    /// Root directory for the database, blocklist and logs. Shared between
    /// the service account and the client UI, so it lives under ProgramData
    /// on Windows rather than a per-user profile.
    pub root: PathBuf,
}

impl Storage {
    /// Full path to the SQLite event database.
    pub fn database_path(&self) -> PathBuf {
        self.root.join("appwarden.db")
    }

    /// Full path to the app blocklist file.
    pub fn blocklist_path(&self) -> PathBuf {
        self.root.join("app_blocklist.json")
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    if cfg!(windows) {
        let program_data =
            std::env::var("ProgramData").unwrap_or_else(|_| r"C:\ProgramData".to_string());
        PathBuf::from(program_data).join("AppWarden")
    } else {
        PathBuf::from("/var/lib/appwarden")
    }
}

#![forbid(unsafe_code)]

use crate::error::Error;
use std::path::PathBuf;

/// Administrator-maintained list of application names to terminate on sight.
/// Names are lowercased on load; membership checks are case-insensitive by
/// construction.
pub trait BlocklistStore: Send + Sync {
    fn load(&self) -> Result<Vec<String>, Error>;
    fn save(&self, names: &[String]) -> Result<(), Error>;
}

/// Blocklist stored as a JSON array of names in a single file. A missing
/// file reads as an empty list.
#[derive(Debug, Clone)]
pub struct JsonBlocklistStore {
    path: PathBuf,
}

impl JsonBlocklistStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl BlocklistStore for JsonBlocklistStore {
    fn load(&self) -> Result<Vec<String>, Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let names: Vec<String> = serde_json::from_str(&text)?;
        Ok(names.into_iter().map(|name| name.to_lowercase()).collect())
    }

    fn save(&self, names: &[String]) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(names)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonBlocklistStore::new(dir.path().join("blocklist.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn names_are_lowercased_on_load() {
        let dir = tempdir().unwrap();
        let store = JsonBlocklistStore::new(dir.path().join("blocklist.json"));

        store
            .save(&["Steam.exe".to_string(), "game.exe".to_string()])
            .unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec!["steam.exe".to_string(), "game.exe".to_string()]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonBlocklistStore::new(path);
        assert!(store.load().is_err());
    }
}

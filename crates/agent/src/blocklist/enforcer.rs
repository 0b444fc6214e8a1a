#![forbid(unsafe_code)]

use crate::blocklist::BlocklistStore;
use crate::monitor::{ProcessSnapshot, Subscriber};
use crate::sensing::ProcessKiller;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Terminates any running process whose name matches a blocklist entry.
///
/// The blocklist is reloaded every tick, so policy edits apply within one
/// polling interval, and enforcement is naturally idempotent: a relaunched
/// process simply shows up in a later snapshot and is killed again.
pub struct BlocklistEnforcer {
    store: Arc<dyn BlocklistStore>,
    killer: Arc<dyn ProcessKiller>,
}

impl BlocklistEnforcer {
    pub fn new(store: Arc<dyn BlocklistStore>, killer: Arc<dyn ProcessKiller>) -> Self {
        Self { store, killer }
    }
}

#[async_trait]
impl Subscriber for BlocklistEnforcer {
    fn name(&self) -> &'static str {
        "BlocklistEnforcer"
    }

    async fn on_snapshot(&self, snapshot: &ProcessSnapshot) {
        let blocklist = match self.store.load() {
            Ok(blocklist) => blocklist,
            Err(err) => {
                // Fail open: blocking cannot happen without the list.
                warn!(%err, "failed to load blocklist, skipping enforcement");
                return;
            }
        };

        if blocklist.is_empty() {
            return;
        }

        for process in &snapshot.processes {
            if process.name.is_empty() {
                continue;
            }

            let name_lower = process.name.to_lowercase();
            if !blocklist.iter().any(|blocked| *blocked == name_lower) {
                continue;
            }

            match self.killer.kill(process.pid) {
                Ok(()) => info!(name = %process.name, pid = process.pid, "killed blocked process"),
                Err(err) => {
                    warn!(%err, name = %process.name, pid = process.pid, "failed to kill blocked process");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sensing::ProcessInfo;
    use std::sync::Mutex;
    use std::time::SystemTime;

    struct StaticStore {
        names: Result<Vec<String>, ()>,
    }

    impl BlocklistStore for StaticStore {
        fn load(&self) -> Result<Vec<String>, Error> {
            self.names
                .clone()
                .map_err(|_| Error::ProcessEnumeration("blocklist unavailable".into()))
        }

        fn save(&self, _names: &[String]) -> Result<(), Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingKiller {
        killed: Mutex<Vec<u32>>,
        fail_pids: Vec<u32>,
    }

    impl ProcessKiller for RecordingKiller {
        fn kill(&self, pid: u32) -> Result<(), Error> {
            if self.fail_pids.contains(&pid) {
                return Err(Error::ProcessTerminate { pid });
            }
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }
    }

    fn snapshot(procs: &[(u32, &str)]) -> ProcessSnapshot {
        ProcessSnapshot {
            processes: procs
                .iter()
                .map(|(pid, name)| ProcessInfo {
                    pid: *pid,
                    name: (*name).to_string(),
                    parent_pid: 1,
                    exe_path: format!(r"C:\Apps\{name}"),
                    start_time: 1,
                })
                .collect(),
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn kills_matching_processes_case_insensitively() {
        let killer = Arc::new(RecordingKiller::default());
        let enforcer = BlocklistEnforcer::new(
            Arc::new(StaticStore {
                names: Ok(vec!["steam.exe".into()]),
            }),
            killer.clone(),
        );

        enforcer
            .on_snapshot(&snapshot(&[(10, "Steam.exe"), (11, "chrome.exe")]))
            .await;

        assert_eq!(*killer.killed.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn kill_failure_does_not_abort_the_pass() {
        let killer = Arc::new(RecordingKiller {
            killed: Mutex::new(Vec::new()),
            fail_pids: vec![10],
        });
        let enforcer = BlocklistEnforcer::new(
            Arc::new(StaticStore {
                names: Ok(vec!["steam.exe".into(), "game.exe".into()]),
            }),
            killer.clone(),
        );

        enforcer
            .on_snapshot(&snapshot(&[(10, "steam.exe"), (20, "game.exe")]))
            .await;

        assert_eq!(*killer.killed.lock().unwrap(), vec![20]);
    }

    #[tokio::test]
    async fn load_failure_and_empty_list_are_no_ops() {
        let killer = Arc::new(RecordingKiller::default());

        let failing = BlocklistEnforcer::new(Arc::new(StaticStore { names: Err(()) }), killer.clone());
        failing.on_snapshot(&snapshot(&[(10, "steam.exe")])).await;

        let empty = BlocklistEnforcer::new(
            Arc::new(StaticStore { names: Ok(vec![]) }),
            killer.clone(),
        );
        empty.on_snapshot(&snapshot(&[(10, "steam.exe")])).await;

        assert!(killer.killed.lock().unwrap().is_empty());
    }
}

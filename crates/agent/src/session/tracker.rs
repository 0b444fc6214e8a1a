#![forbid(unsafe_code)]

use crate::monitor::{ProcessSnapshot, Subscriber};
use crate::persistence::AppEventRepository;
use crate::sensing::{ProcessFilter, ProcessInfo, ProcessSource};
use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Translates raw process snapshots into application-level start/end events.
///
/// A multi-process application (a browser spawning a dozen children under one
/// name) is collapsed into one logical session: only the first instance is
/// logged, later instances bump a reference count, and the session closes
/// when the last instance exits. Every underlying OS process is still tracked
/// by its unique key so end detection stays exact.
pub struct SessionTracker {
    repo: Arc<dyn AppEventRepository>,
    filter: Arc<dyn ProcessFilter>,
    source: Arc<dyn ProcessSource>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    /// Unique key -> lowercased app name, for every open process instance
    /// being tracked, including excluded ones (their exit must be seen too).
    running_procs: FxHashMap<String, String>,
    /// Lowercased app name -> open *logged* instance count. An entry exists
    /// iff its count is positive.
    running_app_counts: FxHashMap<String, u32>,
}

impl SessionTracker {
    pub fn new(
        repo: Arc<dyn AppEventRepository>,
        filter: Arc<dyn ProcessFilter>,
        source: Arc<dyn ProcessSource>,
    ) -> Self {
        Self {
            repo,
            filter,
            source,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Reconcile with sessions the repository believes are still open. Keys
    /// still present in a fresh snapshot are re-adopted; the rest died while
    /// the engine was down and are closed at the current timestamp.
    pub async fn initialize_from_database(&self) {
        let sessions = match self.repo.get_active_sessions().await {
            Ok(sessions) => sessions,
            Err(err) => {
                error!(%err, "failed to load active sessions");
                return;
            }
        };

        let mut state = self.state.lock().await;

        let current_keys: FxHashSet<String> = self
            .source
            .list_processes()
            .map(|procs| procs.iter().map(ProcessInfo::unique_key).collect())
            .unwrap_or_default();

        let now = unix_now();
        let mut adopted = 0usize;
        let mut closed = 0usize;
        for session in sessions {
            if current_keys.contains(&session.key) {
                let name_lower = session.name.to_lowercase();
                state.running_procs.insert(session.key, name_lower.clone());
                *state.running_app_counts.entry(name_lower).or_insert(0) += 1;
                adopted += 1;
            } else {
                if let Err(err) = self.repo.close_app_event(&session.key, now).await {
                    error!(%err, key = %session.key, "failed to close orphaned session");
                }
                closed += 1;
            }
        }
        info!(adopted, closed, "reconciled sessions from database");
    }

    async fn close_ended(
        &self,
        state: &mut SessionState,
        current_keys: &FxHashSet<String>,
        end_time: i64,
    ) {
        let ended: Vec<(String, String)> = state
            .running_procs
            .iter()
            .filter(|(key, _)| !current_keys.contains(*key))
            .map(|(key, name)| (key.clone(), name.clone()))
            .collect();

        for (key, name_lower) in ended {
            if let Err(err) = self.repo.close_app_event(&key, end_time).await {
                error!(%err, key = %key, "failed to record app end event");
            }

            state.running_procs.remove(&key);
            if let Some(count) = state.running_app_counts.get_mut(&name_lower) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    state.running_app_counts.remove(&name_lower);
                }
            }
        }
    }

    async fn open_new(&self, state: &mut SessionState, procs: &[ProcessInfo], start_time: i64) {
        for process in procs {
            let key = process.unique_key();
            if state.running_procs.contains_key(&key) {
                continue;
            }

            if process.name.is_empty() || process.exe_path.is_empty() {
                continue;
            }
            let name_lower = process.name.to_lowercase();

            if self.filter.should_exclude(&process.exe_path, process) {
                // Tracked for end detection, never counted or logged.
                state.running_procs.insert(key, name_lower);
                continue;
            }

            let already_logged = state
                .running_app_counts
                .get(&name_lower)
                .is_some_and(|count| *count > 0);
            if already_logged {
                state.running_procs.insert(key, name_lower.clone());
                *state.running_app_counts.entry(name_lower).or_insert(0) += 1;
                continue;
            }

            if !self.filter.should_track(&process.exe_path, process) {
                continue;
            }

            let parent = format!("PID: {}", process.parent_pid);
            if let Err(err) = self
                .repo
                .log_app_event(
                    &process.name,
                    process.pid,
                    &parent,
                    &process.exe_path,
                    start_time,
                    &key,
                )
                .await
            {
                error!(%err, name = %process.name, "failed to record app start event");
            }

            state.running_procs.insert(key, name_lower.clone());
            state.running_app_counts.insert(name_lower, 1);
        }
    }
}

#[async_trait]
impl Subscriber for SessionTracker {
    fn name(&self) -> &'static str {
        "SessionTracker"
    }

    async fn on_snapshot(&self, snapshot: &ProcessSnapshot) {
        let current_keys: FxHashSet<String> = snapshot
            .processes
            .iter()
            .map(ProcessInfo::unique_key)
            .collect();
        let now = unix_seconds(snapshot.timestamp);

        // End detection before start detection, under one guard, so a close
        // and a re-open of the same key in one tick cannot interleave with a
        // concurrent reader.
        let mut state = self.state.lock().await;
        self.close_ended(&mut state, &current_keys, now).await;
        self.open_new(&mut state, &snapshot.processes, now).await;
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        info!("clearing in-memory session state");
        state.running_procs.clear();
        state.running_app_counts.clear();
    }
}

fn unix_now() -> i64 {
    unix_seconds(SystemTime::now())
}

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

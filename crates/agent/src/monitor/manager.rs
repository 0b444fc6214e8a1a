#![forbid(unsafe_code)]

use crate::monitor::{MonitorOptions, ProcessSnapshot, Subscriber, DEFAULT_POLL_INTERVAL};
use crate::sensing::ProcessSource;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Point-in-time diagnostic view of the monitoring subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub last_tick_time: Option<SystemTime>,
    pub consecutive_failures: u32,
    pub subscriber_count: usize,
}

/// Owns the polling clock, fans snapshots out to subscribers and supervises
/// the loop so a fault in one tick cannot kill monitoring permanently.
///
/// Created once at startup and passed around as an explicit `Arc` handle;
/// components that need to trigger a reset (e.g. a history wipe) hold the
/// handle instead of reaching for process-global state.
pub struct MonitoringManager {
    inner: Arc<Inner>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    source: Arc<dyn ProcessSource>,
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
    poll_interval: Duration,
    restart_delay: Duration,
    restart_max_retries: u32,
    running: AtomicBool,
    consecutive_failures: AtomicU32,
    /// Milliseconds since the epoch; zero means no tick has completed yet.
    last_tick_ms: AtomicU64,
    cancel: std::sync::Mutex<CancellationToken>,
    push_tx: mpsc::Sender<ProcessSnapshot>,
    push_rx: tokio::sync::Mutex<mpsc::Receiver<ProcessSnapshot>>,
    reset_notify: Notify,
}

impl MonitoringManager {
    pub fn new(source: Arc<dyn ProcessSource>, options: MonitorOptions) -> Self {
        let poll_interval = if options.poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            options.poll_interval
        };
        let (push_tx, push_rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(Inner {
                source,
                subscribers: RwLock::new(Vec::new()),
                poll_interval,
                restart_delay: options.restart_delay,
                restart_max_retries: options.restart_max_retries.max(1),
                running: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
                last_tick_ms: AtomicU64::new(0),
                cancel: std::sync::Mutex::new(CancellationToken::new()),
                push_tx,
                push_rx: tokio::sync::Mutex::new(push_rx),
                reset_notify: Notify::new(),
            }),
            supervisor: tokio::sync::Mutex::new(None),
        }
    }

    /// Append a subscriber to the fan-out list. Registration happens during
    /// setup, before [`start`](Self::start).
    pub fn register_subscriber(&self, subscriber: Arc<dyn Subscriber>) {
        if self.inner.running.load(Ordering::SeqCst) {
            warn!(
                subscriber = subscriber.name(),
                "subscriber registered while monitoring is running"
            );
        }
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Launch the supervised polling loop. A no-op when already running.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            info!("monitoring already running, skipping start");
            return;
        }

        let cancel = CancellationToken::new();
        *self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = cancel.clone();

        let inner = self.inner.clone();
        let handle = tokio::spawn(supervise(inner, cancel));
        *self.supervisor.lock().await = Some(handle);
    }

    /// Stop the polling loop and block until it has fully terminated. No tick
    /// is in flight once this returns.
    pub async fn stop(&self) {
        if !self.inner.running.load(Ordering::SeqCst) {
            return;
        }

        self.inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        if let Some(handle) = self.supervisor.lock().await.take() {
            let _ = handle.await;
        }
        self.inner.running.store(false, Ordering::SeqCst);
        info!("monitoring stopped");
    }

    /// Clear in-memory session state on every subscriber that carries any.
    /// Used after a privileged history wipe; persisted history is untouched.
    pub async fn reset(&self) {
        info!("reset signal received");
        self.inner.reset_subscribers().await;
    }

    /// Queue a reset to be handled by the loop between ticks.
    pub fn signal_reset(&self) {
        self.inner.reset_notify.notify_one();
    }

    /// Hand the loop an externally produced snapshot (ad-hoc trigger).
    /// Dropped when a pushed snapshot is already pending.
    pub fn push_snapshot(&self, snapshot: ProcessSnapshot) {
        if self.inner.push_tx.try_send(snapshot).is_err() {
            warn!("pushed snapshot dropped, channel full or loop gone");
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        let last_tick_ms = self.inner.last_tick_ms.load(Ordering::SeqCst);
        HealthStatus {
            is_healthy: self.inner.running.load(Ordering::SeqCst),
            last_tick_time: (last_tick_ms > 0)
                .then(|| UNIX_EPOCH + Duration::from_millis(last_tick_ms)),
            consecutive_failures: self.inner.consecutive_failures.load(Ordering::SeqCst),
            subscriber_count: self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

/// Relaunches the loop task after a panic, up to the retry budget. The loop
/// task is the fault boundary: a panic anywhere in a tick surfaces here as a
/// join error instead of taking the runtime down.
async fn supervise(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        let loop_task = tokio::spawn(run_loop(inner.clone(), cancel.clone()));
        match loop_task.await {
            Ok(()) => return,
            Err(err) if err.is_panic() => {
                let failures = inner.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= inner.restart_max_retries {
                    error!(
                        failures,
                        max_retries = inner.restart_max_retries,
                        "monitoring loop crashed, retry budget exhausted, giving up"
                    );
                    inner.running.store(false, Ordering::SeqCst);
                    return;
                }

                warn!(
                    failures,
                    max_retries = inner.restart_max_retries,
                    delay = ?inner.restart_delay,
                    "monitoring loop crashed, restarting"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        inner.running.store(false, Ordering::SeqCst);
                        return;
                    }
                    _ = tokio::time::sleep(inner.restart_delay) => {}
                }
            }
            Err(_) => return,
        }
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let start = tokio::time::Instant::now() + inner.poll_interval;
    let mut ticker = tokio::time::interval_at(start, inner.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Only the loop consumes pushed snapshots; the guard is held for the
    // loop's lifetime and released when the task ends, panicked or not.
    let mut push_rx = inner.push_rx.lock().await;

    info!(interval = ?inner.poll_interval, "monitoring loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("monitoring loop stopping");
                return;
            }
            Some(snapshot) = push_rx.recv() => {
                inner.notify_subscribers(&snapshot).await;
            }
            _ = inner.reset_notify.notified() => {
                inner.reset_subscribers().await;
            }
            _ = ticker.tick() => {
                inner.capture_and_notify().await;
            }
        }
    }
}

impl Inner {
    async fn capture_and_notify(&self) {
        let processes = match self.source.list_processes() {
            Ok(processes) => processes,
            Err(err) => {
                // Soft failure: skip this tick, do not touch the retry budget.
                warn!(%err, "failed to capture process snapshot");
                return;
            }
        };

        let now = SystemTime::now();
        self.last_tick_ms.store(epoch_millis(now), Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);

        let snapshot = ProcessSnapshot {
            processes,
            timestamp: now,
        };
        self.notify_subscribers(&snapshot).await;
    }

    async fn notify_subscribers(&self, snapshot: &ProcessSnapshot) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for subscriber in subscribers {
            let handled = AssertUnwindSafe(subscriber.on_snapshot(snapshot))
                .catch_unwind()
                .await;
            if handled.is_err() {
                error!(
                    subscriber = subscriber.name(),
                    "subscriber panicked while handling snapshot"
                );
            }
        }
    }

    async fn reset_subscribers(&self) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for subscriber in subscribers {
            subscriber.reset().await;
        }
    }
}

fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

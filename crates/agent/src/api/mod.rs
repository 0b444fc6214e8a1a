#![forbid(unsafe_code)]

mod auth;

pub use auth::{PasswordVerifier, StoredHashVerifier};

use crate::blocklist::BlocklistStore;
use crate::error::Error;
use crate::monitor::{HealthStatus, MonitoringManager};
use crate::persistence::{AppEventRepository, AppUsage};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Collaborators behind the administrative API surface.
pub struct ApiServices {
    pub repo: Arc<dyn AppEventRepository>,
    pub blocklist: Arc<dyn BlocklistStore>,
    pub manager: Arc<MonitoringManager>,
    pub auth: Arc<dyn PasswordVerifier>,
}

/// The operations a local client can drive, independent of transport. The
/// IPC dispatch table maps method names onto these.
pub struct ApiServer {
    services: ApiServices,
    shutdown: CancellationToken,
}

impl ApiServer {
    pub fn new(services: ApiServices, shutdown: CancellationToken) -> Self {
        Self { services, shutdown }
    }

    // --- Stats ---

    pub async fn get_app_leaderboard(&self, since: i64, until: i64) -> Result<Vec<AppUsage>, Error> {
        self.services.repo.app_leaderboard(since, until).await
    }

    /// Seconds of logged app usage since UTC midnight.
    pub async fn get_screen_time(&self) -> Result<i64, Error> {
        let now = unix_now();
        let midnight = now - now.rem_euclid(86_400);
        self.services.repo.total_screen_time(midnight, now).await
    }

    pub async fn get_total_screen_time(&self) -> Result<i64, Error> {
        self.services.repo.total_screen_time(0, unix_now()).await
    }

    // --- App blocklist ---

    pub fn get_app_blocklist(&self) -> Result<Vec<String>, Error> {
        self.services.blocklist.load()
    }

    pub fn block_apps(&self, names: Vec<String>) -> Result<(), Error> {
        let mut blocklist = self.services.blocklist.load()?;
        for name in names {
            let name = name.to_lowercase();
            if !blocklist.contains(&name) {
                blocklist.push(name);
            }
        }
        self.services.blocklist.save(&blocklist)
    }

    pub fn unblock_apps(&self, names: Vec<String>) -> Result<(), Error> {
        let remove: Vec<String> = names.into_iter().map(|name| name.to_lowercase()).collect();
        let mut blocklist = self.services.blocklist.load()?;
        blocklist.retain(|name| !remove.contains(name));
        self.services.blocklist.save(&blocklist)
    }

    pub fn clear_app_blocklist(&self) -> Result<(), Error> {
        self.services.blocklist.save(&[])
    }

    // --- Auth ---

    pub fn login(&self, password: &str) -> Result<bool, Error> {
        if self.services.auth.verify(password) {
            Ok(true)
        } else {
            Err(Error::InvalidPassword)
        }
    }

    pub fn has_password(&self) -> bool {
        self.services.auth.has_password()
    }

    // --- System ---

    /// Wipe the persisted history, then clear the live in-memory session
    /// state through the injected manager handle so counts cannot reference
    /// rows that no longer exist.
    pub async fn clear_app_history(&self, password: &str) -> Result<(), Error> {
        if !self.services.auth.verify(password) {
            return Err(Error::InvalidPassword);
        }
        self.services.repo.clear_history().await?;
        self.services.manager.reset().await;
        Ok(())
    }

    pub fn health_check(&self) -> HealthStatus {
        self.services.manager.health_check()
    }

    pub fn shutdown(&self) -> bool {
        info!("received stop request, shutting down");
        self.shutdown.cancel();
        true
    }

    /// Password-gated teardown: drop the block policy so nothing stays
    /// blocked after the agent is gone, then stop the process. Service
    /// deregistration and binary removal are the installer's job.
    pub fn uninstall(&self, password: &str) -> Result<(), Error> {
        if !self.services.auth.verify(password) {
            return Err(Error::InvalidPassword);
        }
        if let Err(err) = self.services.blocklist.save(&[]) {
            warn!(%err, "failed to clear blocklist during uninstall");
        }
        info!("uninstall requested, stopping agent");
        self.shutdown.cancel();
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

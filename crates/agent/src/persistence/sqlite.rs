#![forbid(unsafe_code)]

use crate::error::Error;
use crate::persistence::{ActiveSession, AppEventRepository, AppUsage};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use tracing::debug;

/// Event history in a single SQLite file. One connection in WAL mode keeps
/// writes serialized; call frequency is one statement per process transition.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(path: PathBuf) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        debug!(path = %path.display(), "event database opened");
        Ok(Self { path, pool })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl AppEventRepository for SqliteRepository {
    async fn log_app_event(
        &self,
        name: &str,
        pid: u32,
        parent: &str,
        exe_path: &str,
        start_time: i64,
        unique_key: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO app_events (unique_key, name, pid, parent, exe_path, start_time) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(unique_key)
        .bind(name)
        .bind(pid as i64)
        .bind(parent)
        .bind(exe_path)
        .bind(start_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close_app_event(&self, unique_key: &str, end_time: i64) -> Result<(), Error> {
        sqlx::query("UPDATE app_events SET end_time = ? WHERE unique_key = ? AND end_time IS NULL")
            .bind(end_time)
            .bind(unique_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<ActiveSession>, Error> {
        let rows = sqlx::query("SELECT unique_key, name FROM app_events WHERE end_time IS NULL")
            .fetch_all(&self.pool)
            .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(ActiveSession {
                key: row.try_get("unique_key")?,
                name: row.try_get("name")?,
            });
        }
        Ok(sessions)
    }

    async fn app_leaderboard(&self, since: i64, until: i64) -> Result<Vec<AppUsage>, Error> {
        let rows = sqlx::query(
            "SELECT name, \
                    SUM(MIN(COALESCE(end_time, ?2), ?2) - MAX(start_time, ?1)) AS total_seconds, \
                    COUNT(*) AS launches \
             FROM app_events \
             WHERE start_time < ?2 AND COALESCE(end_time, ?2) > ?1 \
             GROUP BY name \
             ORDER BY total_seconds DESC",
        )
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        let mut leaderboard = Vec::with_capacity(rows.len());
        for row in rows {
            leaderboard.push(AppUsage {
                name: row.try_get("name")?,
                total_seconds: row.try_get("total_seconds")?,
                launches: row.try_get("launches")?,
            });
        }
        Ok(leaderboard)
    }

    async fn total_screen_time(&self, since: i64, until: i64) -> Result<i64, Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(MIN(COALESCE(end_time, ?2), ?2) - MAX(start_time, ?1)), 0) \
                    AS total_seconds \
             FROM app_events \
             WHERE start_time < ?2 AND COALESCE(end_time, ?2) > ?1",
        )
        .bind(since)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total_seconds")?)
    }

    async fn clear_history(&self) -> Result<(), Error> {
        sqlx::query("DELETE FROM app_events")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#![forbid(unsafe_code)]

use crate::api::ApiServer;
use crate::error::Error;
use crate::ipc::{Request, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Control server on a local streaming endpoint. Messages are
/// newline-delimited JSON, one request in and one response out per turn;
/// connections are independent and concurrent with each other and with the
/// monitoring loop.
pub struct IpcServer {
    api: Arc<ApiServer>,
}

impl IpcServer {
    pub fn new(api: Arc<ApiServer>) -> Self {
        Self { api }
    }

    /// Accept connections until the token is cancelled. A failed accept is
    /// logged and does not stop the listener.
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> Result<(), Error> {
        info!(addr = %listener.local_addr()?, "ipc server listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("ipc server stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "ipc client connected");
                            let api = self.api.clone();
                            tokio::spawn(async move {
                                if let Err(err) = handle_connection(api, stream).await {
                                    debug!(%err, "ipc connection closed");
                                }
                            });
                        }
                        Err(err) => {
                            warn!(%err, "failed to accept ipc connection");
                        }
                    }
                }
            }
        }
    }
}

/// One request decoded, dispatched and answered at a time, until the peer
/// hangs up or sends something undecodable. No connection-level retry; the
/// client reconnects.
async fn handle_connection(api: Arc<ApiServer>, stream: TcpStream) -> Result<(), Error> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = serde_json::from_str(&line)?;

        let response = dispatch(&api, request).await;
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RangeParams {
    since: i64,
    until: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PasswordParams {
    password: String,
}

/// Flat command table. Handler-level failures become the response's error
/// string; they never tear the connection down.
async fn dispatch(api: &ApiServer, request: Request) -> Response {
    let Request { id, method, params } = request;

    let outcome: Result<serde_json::Value, Error> = match method.as_str() {
        // --- Stats ---
        "GetAppLeaderboard" => match parse::<RangeParams>(params) {
            Ok(range) => api
                .get_app_leaderboard(range.since, range.until)
                .await
                .and_then(to_json),
            Err(err) => Err(err),
        },

        "GetScreenTime" => api.get_screen_time().await.and_then(to_json),

        "GetTotalScreenTime" => api.get_total_screen_time().await.and_then(to_json),

        // --- App blocklist ---
        "GetAppBlocklist" => api.get_app_blocklist().and_then(to_json),

        "BlockApps" => match parse::<Vec<String>>(params) {
            Ok(names) => api.block_apps(names).and_then(to_json),
            Err(err) => Err(err),
        },

        "UnblockApps" => match parse::<Vec<String>>(params) {
            Ok(names) => api.unblock_apps(names).and_then(to_json),
            Err(err) => Err(err),
        },

        "ClearAppBlocklist" => api.clear_app_blocklist().and_then(to_json),

        // --- Auth ---
        "Login" => match parse::<PasswordParams>(params) {
            Ok(login) => api.login(&login.password).and_then(to_json),
            Err(err) => Err(err),
        },

        "HasPassword" => to_json(api.has_password()),

        // --- System ---
        "ClearAppHistory" => match parse::<PasswordParams>(params) {
            Ok(gate) => api.clear_app_history(&gate.password).await.and_then(to_json),
            Err(err) => Err(err),
        },

        "HealthCheck" => to_json(api.health_check()),

        "Shutdown" => to_json(api.shutdown()),

        "Uninstall" => match parse::<PasswordParams>(params) {
            Ok(gate) => api.uninstall(&gate.password).and_then(to_json),
            Err(err) => Err(err),
        },

        _ => return Response::err(id, format!("Unknown method: {method}")),
    };

    match outcome {
        Ok(result) => Response::ok(id, result),
        Err(err) => Response::err(id, err.to_string()),
    }
}

fn parse<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, Error> {
    Ok(serde_json::from_value(params)?)
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, Error> {
    Ok(serde_json::to_value(value)?)
}

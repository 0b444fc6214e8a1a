#![forbid(unsafe_code)]

use agent::error::Error;
use agent::{
    ActiveSession, ApiServer, ApiServices, AppEventRepository, AppUsage, IpcServer,
    JsonBlocklistStore, MonitorOptions, MonitoringManager, ProcessInfo, ProcessSource, Request,
    Response, StoredHashVerifier,
};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct EmptySource;

impl ProcessSource for EmptySource {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, Error> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CannedRepo {
    cleared: AtomicBool,
}

#[async_trait]
impl AppEventRepository for CannedRepo {
    async fn log_app_event(
        &self,
        _name: &str,
        _pid: u32,
        _parent: &str,
        _exe_path: &str,
        _start_time: i64,
        _unique_key: &str,
    ) -> Result<(), Error> {
        Ok(())
    }

    async fn close_app_event(&self, _unique_key: &str, _end_time: i64) -> Result<(), Error> {
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<ActiveSession>, Error> {
        Ok(Vec::new())
    }

    async fn app_leaderboard(&self, since: i64, until: i64) -> Result<Vec<AppUsage>, Error> {
        Ok(vec![AppUsage {
            name: "chrome.exe".into(),
            total_seconds: until - since,
            launches: 2,
        }])
    }

    async fn total_screen_time(&self, _since: i64, _until: i64) -> Result<i64, Error> {
        Ok(1234)
    }

    async fn clear_history(&self) -> Result<(), Error> {
        self.cleared.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    addr: SocketAddr,
    repo: Arc<CannedRepo>,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

async fn start_server(password: Option<&str>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(CannedRepo::default());
    let blocklist = Arc::new(JsonBlocklistStore::new(dir.path().join("blocklist.json")));
    let manager = Arc::new(MonitoringManager::new(
        Arc::new(EmptySource),
        MonitorOptions::default(),
    ));
    let auth = Arc::new(StoredHashVerifier::new(
        password.map(StoredHashVerifier::digest),
    ));

    let shutdown = CancellationToken::new();
    let api = Arc::new(ApiServer::new(
        ApiServices {
            repo: repo.clone(),
            blocklist,
            manager,
            auth,
        },
        shutdown.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(IpcServer::new(api).serve(listener, shutdown.clone()));

    Harness {
        addr,
        repo,
        shutdown,
        _dir: dir,
    }
}

struct Client {
    reader: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn call(&mut self, id: &str, method: &str, params: serde_json::Value) -> Response {
        let request = Request {
            id: id.to_string(),
            method: method.to_string(),
            params,
        };
        self.send_raw(&serde_json::to_string(&request).unwrap()).await;
        let line = self.reader.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

#[tokio::test]
async fn unknown_method_yields_error_response() {
    let harness = start_server(None).await;
    let mut client = Client::connect(harness.addr).await;

    let response = client.call("7", "Frobnicate", serde_json::Value::Null).await;
    assert_eq!(response.id, "7");
    assert_eq!(response.error.as_deref(), Some("Unknown method: Frobnicate"));
    assert!(response.result.is_none());

    // the connection survives an unknown method
    let response = client.call("8", "HasPassword", serde_json::Value::Null).await;
    assert_eq!(response.id, "8");
    assert_eq!(response.result, Some(serde_json::json!(false)));
}

#[tokio::test]
async fn blocklist_round_trips_through_the_wire() {
    let harness = start_server(None).await;
    let mut client = Client::connect(harness.addr).await;

    let response = client
        .call("1", "BlockApps", serde_json::json!(["Steam.exe", "game.exe"]))
        .await;
    assert!(response.error.is_none());

    let response = client.call("2", "GetAppBlocklist", serde_json::Value::Null).await;
    assert_eq!(response.result, Some(serde_json::json!(["steam.exe", "game.exe"])));

    let response = client
        .call("3", "UnblockApps", serde_json::json!(["STEAM.EXE"]))
        .await;
    assert!(response.error.is_none());

    let response = client.call("4", "GetAppBlocklist", serde_json::Value::Null).await;
    assert_eq!(response.result, Some(serde_json::json!(["game.exe"])));

    let response = client.call("5", "ClearAppBlocklist", serde_json::Value::Null).await;
    assert!(response.error.is_none());

    let response = client.call("6", "GetAppBlocklist", serde_json::Value::Null).await;
    assert_eq!(response.result, Some(serde_json::json!([])));
}

#[tokio::test]
async fn stats_methods_dispatch_with_and_without_params() {
    let harness = start_server(None).await;
    let mut client = Client::connect(harness.addr).await;

    let response = client
        .call("1", "GetAppLeaderboard", serde_json::json!({"since": 100, "until": 400}))
        .await;
    let leaderboard = response.result.unwrap();
    assert_eq!(leaderboard[0]["name"], "chrome.exe");
    assert_eq!(leaderboard[0]["total_seconds"], 300);
    assert_eq!(leaderboard[0]["launches"], 2);

    let response = client.call("2", "GetScreenTime", serde_json::Value::Null).await;
    assert_eq!(response.result, Some(serde_json::json!(1234)));

    let response = client.call("3", "HealthCheck", serde_json::Value::Null).await;
    let health = response.result.unwrap();
    assert_eq!(health["is_healthy"], false);
    assert_eq!(health["subscriber_count"], 0);
}

#[tokio::test]
async fn wrong_password_is_an_error_string_not_a_fault() {
    let harness = start_server(Some("hunter2")).await;
    let mut client = Client::connect(harness.addr).await;

    let response = client
        .call("1", "Login", serde_json::json!({"password": "wrong"}))
        .await;
    assert_eq!(response.error.as_deref(), Some("Invalid password"));

    let response = client
        .call("2", "Login", serde_json::json!({"password": "hunter2"}))
        .await;
    assert!(response.error.is_none());
    assert_eq!(response.result, Some(serde_json::json!(true)));

    let response = client
        .call("3", "ClearAppHistory", serde_json::json!({"password": "wrong"}))
        .await;
    assert_eq!(response.error.as_deref(), Some("Invalid password"));
    assert!(!harness.repo.cleared.load(Ordering::SeqCst));

    let response = client
        .call("4", "ClearAppHistory", serde_json::json!({"password": "hunter2"}))
        .await;
    assert!(response.error.is_none());
    assert!(harness.repo.cleared.load(Ordering::SeqCst));
}

#[tokio::test]
async fn undecodable_request_tears_down_only_that_connection() {
    let harness = start_server(None).await;

    let mut broken = Client::connect(harness.addr).await;
    broken.send_raw("this is not json").await;
    assert!(broken.reader.next_line().await.unwrap().is_none());

    // the listener and fresh connections are unaffected
    let mut fresh = Client::connect(harness.addr).await;
    let response = fresh.call("1", "HasPassword", serde_json::Value::Null).await;
    assert_eq!(response.result, Some(serde_json::json!(false)));
}

#[tokio::test]
async fn shutdown_cancels_the_process_token() {
    let harness = start_server(None).await;
    let mut client = Client::connect(harness.addr).await;

    let response = client.call("1", "Shutdown", serde_json::Value::Null).await;
    assert_eq!(response.result, Some(serde_json::json!(true)));
    assert!(harness.shutdown.is_cancelled());
}

#[tokio::test]
async fn uninstall_is_password_gated_and_clears_the_blocklist() {
    let harness = start_server(Some("hunter2")).await;
    let mut client = Client::connect(harness.addr).await;

    client
        .call("1", "BlockApps", serde_json::json!(["game.exe"]))
        .await;

    let response = client
        .call("2", "Uninstall", serde_json::json!({"password": "nope"}))
        .await;
    assert_eq!(response.error.as_deref(), Some("Invalid password"));
    assert!(!harness.shutdown.is_cancelled());

    let response = client
        .call("3", "Uninstall", serde_json::json!({"password": "hunter2"}))
        .await;
    assert!(response.error.is_none());
    assert!(harness.shutdown.is_cancelled());
}

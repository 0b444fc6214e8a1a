mod cli;

use agent::{
    ApiServer, ApiServices, BlocklistEnforcer, CachedProcessSource, IpcServer, MonitorOptions,
    MonitoringManager, SessionTracker, SqliteRepository, StoredHashVerifier, SysinfoKiller,
    SysinfoSource, WindowsRuleFilter,
};
use clap::Parser;
use cli::Cli;
use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The verbosity flag takes precedence over the environment variable for
    // log control; `APPWARDEN_LOG` can still set per-crate levels.
    let env_filter = EnvFilter::builder()
        .with_default_directive("sqlx=warn".parse()?)
        .with_env_var("APPWARDEN_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let mut config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => {
            let default_root = config::Storage::default().root;
            let mut candidates = glob::glob(
                &default_root.join("config.d").join("*.toml").display().to_string(),
            )?
            .filter_map(Result::ok)
            .collect::<Vec<_>>();
            candidates.insert(0, default_root.join("config.toml"));
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    if let Some(listen) = &cli.listen {
        config.ipc.listen_addr = listen.clone();
    }
    debug!(?config, ?cli);

    // process sensing, shared by the polling loop and the session tracker
    let source = Arc::new(CachedProcessSource::new(
        Arc::new(SysinfoSource::new()),
        config.engine.source_cache_ttl,
    ));

    let repo = Arc::new(SqliteRepository::new(config.storage.database_path()).await?);
    let blocklist = Arc::new(agent::JsonBlocklistStore::new(config.storage.blocklist_path()));

    let manager = Arc::new(MonitoringManager::new(
        source.clone(),
        MonitorOptions::from(&config.engine),
    ));

    let tracker = Arc::new(SessionTracker::new(
        repo.clone(),
        Arc::new(WindowsRuleFilter::new()),
        source.clone(),
    ));
    tracker.initialize_from_database().await;
    manager.register_subscriber(tracker);

    manager.register_subscriber(Arc::new(BlocklistEnforcer::new(
        blocklist.clone(),
        Arc::new(SysinfoKiller::new()),
    )));

    manager.start().await;

    // control plane
    let shutdown = CancellationToken::new();
    let api = Arc::new(ApiServer::new(
        ApiServices {
            repo,
            blocklist,
            manager: manager.clone(),
            auth: Arc::new(StoredHashVerifier::new(config.auth.password_hash.clone())),
        },
        shutdown.clone(),
    ));

    let listener = TcpListener::bind(&config.ipc.listen_addr).await?;
    let ipc_handle = tokio::spawn(IpcServer::new(api).serve(listener, shutdown.clone()));

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("shutdown requested over ipc");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    }

    manager.stop().await;
    ipc_handle.await??;
    Ok(())
}

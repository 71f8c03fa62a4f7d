//! trunkcast daemon - trunked radio event hub
//!
//! Tails the decoder's log, accepts its status WebSocket, and fans calls,
//! decode rates and spectrum frames out to viewers on `/ws`. Optionally
//! mirrors calls to a legacy dispatch console. Replay and spectrum capture
//! are controlled over a Unix socket (`replay <id> [loop]`, `record <id>`, ...).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use trunkcast_broadcaster::{BroadcastHub, HubServer};
use trunkcast_daemon::{
    Daemon, DaemonConfig, DispatchBridge, EventRouter, IpcServer, SpectrumCapture,
};
use trunkcast_logwatch::LogWatcher;
use trunkcast_model::{CallStore, MemoryCallStore};
use trunkcast_spectrum::{RecordingStore, SpectrumReplayer};
use trunkcast_status::StatusChannelListener;

#[derive(Parser)]
#[command(name = "trunkcast-daemon", version)]
struct Cli {
    /// Path to a config.toml (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Decoder log to tail, overriding the config
    #[arg(long)]
    log_path: Option<String>,
    /// Debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_level(true)
        .init();

    info!("📻 Starting trunkcast daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("Failed to load configuration")?;
    if let Some(log_path) = cli.log_path {
        config.log_path = Some(log_path);
    }

    info!("📋 Configuration loaded from {}", config.config_path.display());

    let calls: Arc<dyn CallStore> = Arc::new(MemoryCallStore::new());
    let hub = BroadcastHub::new(config.subscriber_buffer);
    let recordings_dir = config.recordings_dir()?;
    info!("💾 Spectrum recordings in {}", recordings_dir.display());
    let store = RecordingStore::new(recordings_dir);
    let capture = Arc::new(SpectrumCapture::new(store.clone()));
    let mut router =
        EventRouter::new(Arc::clone(&calls), hub.clone()).with_capture(Arc::clone(&capture));

    // Dispatch console bridge
    let dispatch_task = match &config.dispatch {
        Some(dispatch) => {
            info!(
                "📡 Dispatch console bridge to {}:{} as {:?}",
                dispatch.host, dispatch.port, dispatch.endpoint_name
            );
            let (bridge, task) = DispatchBridge::spawn(dispatch.clone());
            router = router.with_dispatch(bridge);
            Some(task)
        }
        None => None,
    };

    // Viewer hub
    let hub_server = HubServer::new(config.hub_listen, hub.clone());
    hub_server
        .start()
        .await
        .context("Failed to start viewer hub")?;

    // Decoder status channel
    let (status, mut status_events) = StatusChannelListener::new();
    let status_addr = config.status_listen;
    let status_server = {
        let status = status.clone();
        tokio::spawn(async move {
            if let Err(e) = trunkcast_status::server::serve(status_addr, status).await {
                error!("Status channel server error: {}", e);
            }
        })
    };
    {
        let router = router.clone();
        tokio::spawn(async move {
            while let Some(event) = status_events.recv().await {
                router.handle_status_event(event);
            }
        });
    }

    // Decoder log
    let watcher = match config.log_watcher_config()? {
        Some(watcher_config) => {
            let watcher = LogWatcher::new(watcher_config);
            let mut events = watcher.start().context("Failed to start log watcher")?;
            let router = router.clone();
            tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    router.handle_control_event(event, chrono::Utc::now());
                }
            });
            Some(watcher)
        }
        None => {
            warn!("⚠️ No log_path configured, control channel tailing disabled");
            None
        }
    };

    // Spectrum replay
    let (replayer, mut replay_events) = SpectrumReplayer::new(store, config.replay_source_index);
    {
        let router = router.clone();
        tokio::spawn(async move {
            while let Some(event) = replay_events.recv().await {
                router.handle_replay_event(event);
            }
        });
    }

    // Control socket
    let socket_path = config.ipc_socket_path()?;
    info!("🔌 Starting IPC server on {}", socket_path.display());
    let daemon = Arc::new(Daemon::new(
        replayer.clone(),
        hub.clone(),
        status,
        Arc::clone(&calls),
    )
    .with_capture(capture));
    let mut ipc_server =
        IpcServer::new(&socket_path, daemon).context("Failed to start IPC server")?;

    info!("🚀 trunkcast daemon ready!");
    info!("   Viewers: ws://{}/ws", config.hub_listen);
    info!("   Decoder status: ws://{}/", config.status_listen);

    tokio::select! {
        result = ipc_server.run() => {
            if let Err(e) = result {
                error!("IPC server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    // Cleanup
    info!("🧹 Shutting down...");
    if let Err(e) = replayer.stop_replay().await {
        warn!("Failed to stop replay: {}", e);
    }
    if let Some(watcher) = &watcher {
        watcher.stop().await;
    }
    if let Err(e) = hub_server.stop().await {
        warn!("Failed to stop viewer hub: {}", e);
    }
    status_server.abort();
    if let Some(task) = dispatch_task {
        task.abort();
    }
    let _ = std::fs::remove_file(&socket_path);
    info!("👋 trunkcast daemon stopped");

    Ok(())
}

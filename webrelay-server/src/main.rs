use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webrelay::config::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_AGE, DEFAULT_MAX_PENDING};
use webrelay::executor::shutdown_channel;
use webrelay::{
    ExecutorConfig, ExtensionBridge, LocalRelayClient, OperationQueue, PollingExecutor,
    RelayConfig, Sweeper,
};
use webrelay_server::{build_router, AppState, RELAY_PATH};

#[derive(Parser, Debug)]
#[command(name = "webrelay-server")]
#[command(about = "HTTP relay that queues browser operations for a polling executor")]
struct Args {
    /// Address to bind
    #[arg(long, env = "WEBRELAY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "WEBRELAY_PORT", default_value_t = 3000)]
    port: u16,

    /// Enable CORS for all origins
    #[arg(long, env = "WEBRELAY_CORS")]
    cors: bool,

    /// Age after which pending operations and results are discarded
    #[arg(long, env = "WEBRELAY_MAX_AGE_SECS", default_value_t = DEFAULT_MAX_AGE.as_secs())]
    max_age_secs: u64,

    /// Period of the expiry sweep
    #[arg(long, env = "WEBRELAY_CLEANUP_SECS", default_value_t = DEFAULT_CLEANUP_INTERVAL.as_secs())]
    cleanup_secs: u64,

    /// Maximum number of queued operations
    #[arg(long, env = "WEBRELAY_MAX_PENDING", default_value_t = DEFAULT_MAX_PENDING)]
    max_pending: usize,

    /// Also run an in-process executor behind a browser extension bridge on this address
    #[arg(long, env = "WEBRELAY_BRIDGE_ADDR")]
    bridge_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,webrelay=debug,tower_http=info")),
        )
        .with_target(false)
        .init();

    info!("🚀 Starting webrelay-server v{}", env!("CARGO_PKG_VERSION"));
    info!("🔧 Port: {}", args.port);
    info!("🔧 CORS: {}", if args.cors { "enabled" } else { "disabled" });

    let queue = Arc::new(OperationQueue::new(RelayConfig {
        max_age: Duration::from_secs(args.max_age_secs),
        cleanup_interval: Duration::from_secs(args.cleanup_secs.max(1)),
        max_pending: args.max_pending,
    }));
    let _sweeper = Sweeper::spawn(queue.clone());

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut executor_task = None;
    if let Some(addr) = &args.bridge_addr {
        let bridge = ExtensionBridge::start(addr)
            .await
            .with_context(|| format!("failed to start extension bridge on {addr}"))?;
        info!("🔌 Extension bridge listening on ws://{}", bridge.local_addr());
        let executor = PollingExecutor::new(
            LocalRelayClient::new(queue.clone()),
            bridge,
            ExecutorConfig::default(),
        );
        executor_task = Some(tokio::spawn(executor.run(shutdown_rx)));
    }

    let app = build_router(AppState::new(queue), args.cors);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("✅ Server listening on http://{}", addr);
    info!("📡 Relay endpoint: http://{}{}", addr, RELAY_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = executor_task {
        if let Err(e) = task.await {
            warn!("Executor task ended abnormally: {}", e);
        }
    }
    info!("👋 Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown requested");
}

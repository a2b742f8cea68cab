use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webrelay::bridge::DEFAULT_BRIDGE_ADDR;
use webrelay::config::{DEFAULT_EVAL_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_RELAY_URL};
use webrelay::executor::shutdown_channel;
use webrelay::{ExecutorConfig, ExtensionBridge, HttpRelayClient, PollingExecutor};

#[derive(Parser, Debug)]
#[command(name = "webrelay-agent")]
#[command(about = "Polls a relay for browser operations and runs them through the extension bridge")]
struct Args {
    /// Relay endpoint to poll
    #[arg(long, env = "WEBRELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    /// Address the browser extension connects to
    #[arg(long, env = "WEBRELAY_BRIDGE_ADDR", default_value = DEFAULT_BRIDGE_ADDR)]
    bridge_addr: String,

    /// Polling period in milliseconds
    #[arg(long, env = "WEBRELAY_POLL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_ms: u64,

    /// Script evaluation timeout in milliseconds
    #[arg(long, env = "WEBRELAY_EVAL_TIMEOUT_MS", default_value_t = DEFAULT_EVAL_TIMEOUT.as_millis() as u64)]
    eval_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,webrelay=debug")),
        )
        .with_target(false)
        .init();

    info!("🚀 Starting webrelay-agent v{}", env!("CARGO_PKG_VERSION"));
    info!("🔧 Relay: {}", args.relay_url);

    let config = ExecutorConfig {
        relay_url: args.relay_url,
        poll_interval: Duration::from_millis(args.poll_ms.max(1)),
        eval_timeout: Duration::from_millis(args.eval_timeout_ms),
        ..Default::default()
    };

    let bridge = ExtensionBridge::start(&args.bridge_addr)
        .await
        .with_context(|| format!("failed to start extension bridge on {}", args.bridge_addr))?;
    info!("🔌 Waiting for the browser extension on ws://{}", bridge.local_addr());

    let client = HttpRelayClient::new(config.relay_url.clone(), config.request_timeout)
        .context("failed to build relay client")?;
    let executor = PollingExecutor::new(client, bridge, config);

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let task = tokio::spawn(executor.run(shutdown_rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("🛑 Shutdown requested");
    let _ = shutdown_tx.send(true);
    task.await.context("executor task panicked")?;
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;

use tenant_gateway::config::load_config;
use tenant_gateway::lifecycle::{signals, start, Shutdown};
use tenant_gateway::observability::{logging, metrics};
use tenant_gateway::GatewayConfig;

#[derive(Parser)]
#[command(name = "tenant-gateway")]
#[command(about = "Multi-tenant request gateway with per-project firewall rules", long_about = None)]
struct Args {
    /// Path to the gateway configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("tenant-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = %config.store.path,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let running = start(config, &shutdown).await?;
    tracing::info!(address = %running.gateway_addr, "Gateway ready");

    signals::wait_for_signal().await;
    shutdown.trigger();
    running.wait().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

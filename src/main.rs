//! Workload Volumes
//!
//! REST service reporting which persistent volumes and claims on a Kubernetes
//! cluster an application workload can reuse.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use workload_volumes::{
    ApiServer, ApiServerConfig, EngineConfig, Error, GatewayFactory, Result, VolumeEngine,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Workload Volumes - storage reuse engine for application workloads
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Engine configuration file (YAML)
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Override the aggregation deadline in seconds (0 disables it)
    #[arg(long, env = "AGGREGATION_TIMEOUT_SECS")]
    aggregation_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting Workload Volumes");
    info!("  Version: {}", workload_volumes::VERSION);
    info!("  REST API: {}", args.api_addr);

    let mut config = match &args.config {
        Some(path) => {
            info!("  Config file: {}", path.display());
            EngineConfig::from_yaml_file(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(secs) = args.aggregation_timeout_secs {
        config.aggregation_timeout_secs = secs;
    }
    info!("  Aggregation timeout: {:?}", config.aggregation_timeout());

    let rest_addr: SocketAddr = args.api_addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid REST API address: {}", e))
    })?;

    let gateway = GatewayFactory::connect().await?;
    let engine = VolumeEngine::new(config, gateway)?;
    info!("Connected to cluster via {} gateway", engine.gateway_name());

    let api_server = Arc::new(ApiServer::new(ApiServerConfig { rest_addr }, engine));
    let shutdown = api_server.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received ctrl-c, shutting down"),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
        let _ = shutdown.send(());
    });

    api_server.run().await?;

    info!("Shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "tower_http=info"] {
        filter = filter.add_directive(directive.parse::<Directive>().map_err(|e| {
            Error::Configuration(format!("Invalid log directive {}: {}", directive, e))
        })?);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use loginguard::config::{LogFormat, LoginGuardConfig};
use loginguard::grpc::GrpcServer;
use loginguard::ratelimit::{LoginRateLimiter, Sweeper};
use loginguard::telemetry;

/// Login attempt rate limiting service.
#[derive(Debug, Parser)]
#[command(name = "loginguard", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address for the gRPC server, overrides the configuration
    #[arg(long)]
    grpc_addr: Option<SocketAddr>,

    /// Log output format, overrides the configuration
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = LoginGuardConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.grpc_addr {
        config.server.grpc_addr = addr;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    telemetry::init(&config.logging);

    info!("Starting Loginguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let policy = config.rate_limiting.policy();
    info!(
        grpc_addr = %config.server.grpc_addr,
        max_attempts = policy.max_attempts,
        window_secs = policy.window.as_secs(),
        block_duration_secs = policy.block_duration.as_secs(),
        "Configuration loaded"
    );

    // One limiter for the whole process, shared by the server and the sweeper
    let rate_limiter = Arc::new(LoginRateLimiter::new(policy));
    let sweeper = Sweeper::spawn(rate_limiter.clone(), config.rate_limiting.sweep_interval());

    let grpc_server = GrpcServer::new(config.server.grpc_addr, rate_limiter);

    // Run the server with graceful shutdown on Ctrl+C
    let result = grpc_server.serve_with_shutdown(shutdown_signal()).await;

    sweeper.shutdown().await;
    result?;

    info!("Loginguard stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

//! Donation payment service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Donor                 ┌──────────────────────────────────────────────────────┐
//!   ──────────────────────┼─▶ http ──▶ payments::initiation ──▶ gateway          │
//!                         │                      │                               │
//!                         │                      ▼                               │
//!   Provider redirect     │                   ledger ◀──┐                        │
//!   ──────────────────────┼─▶ http ──▶ payments::reconcile ──▶ notify            │
//!                         │                      ▲                               │
//!                         │      payments::scheduler (timer)                     │
//!                         │                                                      │
//!   Admin (bearer key)    │                                                      │
//!   ──────────────────────┼─▶ admin ──▶ approval::router ──▶ tables | queue      │
//!                         │                                                      │
//!                         │  config · observability · resilience · lifecycle     │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use donation_core::config::{load_config, ServiceConfig};
use donation_core::lifecycle::{build_state, spawn_signal_handler, Shutdown};
use donation_core::observability::{logging, metrics};
use donation_core::HttpServer;

#[derive(Parser)]
#[command(name = "donation-core")]
#[command(about = "Donation payment lifecycle and reconciliation service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "DONATION_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "donation-core starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        gateway_mode = ?config.gateway.mode,
        scheduler_interval_secs = config.scheduler.interval_secs,
        request_timeout_secs = config.timeouts.request_secs,
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

    let bind_address = config.listener.bind_address.clone();
    let state = build_state(config).await?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let scheduler = state.scheduler.clone();
    let scheduler_shutdown = shutdown.subscribe();
    let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(state);
    let result = server.run(listener, shutdown.subscribe()).await;

    // The server may stop on its own; make sure the scheduler follows.
    shutdown.trigger();
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

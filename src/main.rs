//! Replica balancer daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌──────────────────────────────────────────────────────┐
//!                │                  REPLICA BALANCER                     │
//!                │                                                      │
//!   gateway ─────┼─▶ get_healthy_instance ──▶ ┌──────────────┐          │
//!                │                            │ LoadBalancer │          │
//!   gateway ─────┼─▶ record_success/failure ─▶│  + breakers  │          │
//!                │                            └──────▲───────┘          │
//!                │                                   │ probe results     │
//!                │                            ┌──────┴───────┐          │
//!                │                            │HealthChecker │──── GET ─┼──▶ replicas
//!                │                            └──────────────┘          │
//!                │  ┌────────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ │
//!                │  │   config   │ │  admin  │ │ metrics  │ │lifecycle│ │
//!                │  │ + watcher  │ │   API   │ │ + logs   │ │         │ │
//!                │  └────────────┘ └─────────┘ └──────────┘ └─────────┘ │
//!                └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use replica_balancer::admin::{setup_admin_router, AdminState};
use replica_balancer::config::{load_config, watcher::ConfigWatcher};
use replica_balancer::lifecycle::{signals, Shutdown};
use replica_balancer::observability::{logging, metrics};
use replica_balancer::LoadBalancer;

#[derive(Parser)]
#[command(name = "replica-balancer")]
#[command(about = "Client-side load balancer with circuit breaking and health checks")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "balancer.toml")]
    config: PathBuf,

    /// Watch the configuration file and apply changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability.log_level)?;
    tracing::info!("replica-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        strategy = %config.balancer.strategy,
        instances = config.balancer.instances.len(),
        max_failures = config.balancer.max_failures,
        recovery_timeout_ms = config.balancer.recovery_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let balancer = Arc::new(
        LoadBalancer::from_config(&config.balancer).with_health_check(config.health_check.clone()),
    );
    if config.health_check.enabled {
        balancer.start_health_checking()?;
    } else {
        tracing::info!("Active health checks disabled");
    }

    let shutdown = Shutdown::new();

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AdminState::new(balancer.clone(), config.admin.api_key.as_str()));
        let stop = shutdown.wait();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "Admin API server failed");
            }
        }))
    } else {
        None
    };

    let watch = if args.watch {
        Some(ConfigWatcher::new(args.config.clone(), balancer.clone()).spawn(shutdown.subscribe())?)
    } else {
        None
    };

    signals::wait_for_shutdown().await;
    shutdown.trigger();

    if let Some(task) = admin_task {
        let _ = task.await;
    }
    if let Some(watch) = watch {
        watch.stopped().await;
    }
    balancer.stop_health_checking().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

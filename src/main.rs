//! Session router host - Entry Point
//!
//! Hosts one session registry backed by per-client counter services and
//! serves it over TCP until interrupted.

use log::{error, info};
use std::sync::Arc;

use session_router::boundary::{IsolationBoundary, LogicalBoundary, TaskBoundary};
use session_router::config::{BoundaryKind, HostConfig};
use session_router::service::{CounterService, service_factory};
use session_router::transport::ObjectDirectory;
use session_router::utils::logging::setup_logging;
use session_router::{SessionRegistry, TcpHost};

#[tokio::main]
async fn main() {
    setup_logging();

    let config = match HostConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Launching session router...");

    let directory = Arc::new(ObjectDirectory::new(&config.node_name));
    let boundary: Arc<dyn IsolationBoundary> = match config.boundary {
        BoundaryKind::Task => Arc::new(TaskBoundary::new()),
        BoundaryKind::Logical => Arc::new(LogicalBoundary::new()),
    };

    let mut builder = SessionRegistry::builder(
        &config.registry_path,
        service_factory(|client_id| Ok(CounterService::new(client_id))),
    )
    .idle_timeout(config.idle_timeout())
    .boundary(boundary)
    .directory(Arc::clone(&directory));
    if let Some(rate_limit) = config.rate_limit() {
        builder = builder.rate_limit(rate_limit);
    }

    let registry = match builder.build().await {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to start session registry: {}", e);
            std::process::exit(1);
        }
    };

    let host = match TcpHost::bind(
        &config.socket_address(),
        Arc::clone(&directory),
        config.max_frame_length,
    )
    .await
    {
        Ok(host) => host,
        Err(e) => {
            error!("Host startup failed on {}: {}", config.socket_address(), e);
            registry.dispose().await;
            std::process::exit(1);
        }
    };

    info!(
        "Clients may connect to tcp://{}{}",
        config.socket_address(),
        registry.address()
    );

    tokio::select! {
        _ = host.start() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }

    registry.dispose().await;
}

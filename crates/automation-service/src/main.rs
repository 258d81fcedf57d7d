//! Binary entry point for the tracker automation engine service.
//!
//! - Initializes structured logging.
//! - Loads and range-validates `ServiceConfig`.
//! - Wires the tracker client, engine, webhook dispatcher, permission
//!   gate, and health monitor into `automation_api::AppState`.
//! - Starts the background retention-sweep task and the HTTP listener.

use automation_service::{build_app_state, spawn_cleanup_sweep, ServiceConfig};
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "automation_service=info,automation_api=info,automation_core=info,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting tracker automation engine service");

    let config = match ServiceConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error, aborting before startup");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .unwrap_or_else(|_| panic!("invalid server_host/server_port: {}:{}", config.server_host, config.server_port));

    let state = match build_app_state(&config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to build application state");
            std::process::exit(1);
        }
    };

    state.engine.start().await;
    let cleanup_handle = spawn_cleanup_sweep(state.engine.clone());

    info!(%addr, "automation engine ready");

    if let Err(e) = automation_api::start_server(addr, state.clone()).await {
        error!(error = %e, "server failed");
        cleanup_handle.abort();
        state.engine.shutdown().await;
        std::process::exit(1);
    }

    cleanup_handle.abort();
    state.engine.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

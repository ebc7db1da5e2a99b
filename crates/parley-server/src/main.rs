//! # parley-server
//!
//! Stateless real-time messaging gateway. Each process terminates its own
//! WebSocket connections and shares everything else through the
//! coordination store:
//! - **presence directory** so any process can tell who is reachable
//! - **fixed-window rate limiting** for OTP issuance and messaging
//! - **group fan-out** over pattern pub/sub, so group traffic reaches
//!   members regardless of which process holds their connection
//!
//! Message, group, and user records are persisted through the
//! `parley-store` collaborator interfaces; this binary wires the bundled
//! in-memory implementation, which a deployment replaces with its
//! document store.

mod api;
mod auth;
mod config;
mod delivery;
mod error;
mod gateway;
mod groups;
mod rooms;
mod state;
mod typing;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parley_coord::RedisCoord;
use parley_store::MemoryStore;

use crate::auth::LogSmsSender;
use crate::config::ServerConfig;
use crate::state::{AppState, Persistence};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting Parley messaging server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Connect the coordination store and wire up shared state
    // -----------------------------------------------------------------------
    let coord = Arc::new(RedisCoord::connect(&config.redis_url).await?);

    let store = Arc::new(MemoryStore::new());
    let persistence = Persistence {
        messages: store.clone(),
        group_messages: store.clone(),
        groups: store.clone(),
        users: store,
    };

    let http_addr = config.http_addr;
    let state = AppState::build(
        config,
        coord.clone(),
        coord,
        persistence,
        Arc::new(LogSmsSender),
    );

    // -----------------------------------------------------------------------
    // 4. Subscribe this process to the group fan-out bus
    // -----------------------------------------------------------------------
    let fanout = tokio::spawn(groups::run_fanout(state.bus.clone(), state.rooms.clone()));

    // -----------------------------------------------------------------------
    // 5. Run until the server stops, the subscription dies, or Ctrl+C
    // -----------------------------------------------------------------------
    // Losing the fan-out subscription would silently split the cluster,
    // so it is fatal: log and exit, and let the supervisor restart us.
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        result = fanout => {
            error!(?result, "Fan-out subscription terminated");
            anyhow::bail!("fan-out subscription terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

//! Exchange server binary
//!
//! Boots the exchange core task, the event dispatcher, and the two
//! WebSocket listeners, then waits for ctrl-c to run the orderly
//! shutdown path: reject-all mode, at most one partial round
//! finalization, a final tournament_complete, exit.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use exchange_server::actor::spawn_core;
use exchange_server::config::ExchangeConfig;
use exchange_server::core::ExchangeCore;
use exchange_server::dispatch::{run_dispatcher, SubscriberRegistry, EVENT_QUEUE_DEPTH};
use exchange_server::{gateway, stream};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ExchangeConfig::from_env()?;
    info!(
        rounds = config.total_rounds,
        duration_secs = config.round_duration_secs,
        "starting trading arena exchange"
    );

    let gateway_listener = TcpListener::bind(config.gateway_addr).await?;
    let stream_listener = TcpListener::bind(config.stream_addr).await?;
    info!(addr = %config.gateway_addr, "order gateway listening");
    info!(addr = %config.stream_addr, "event stream listening");

    let subscribers = Arc::new(SubscriberRegistry::new());
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let dispatcher = tokio::spawn(run_dispatcher(events_rx, subscribers.clone()));

    let core = ExchangeCore::new(config);
    let (handle, core_task) = spawn_core(core, events_tx);

    let gateway_app = gateway::router(handle.clone());
    let gateway_server = tokio::spawn(async move {
        if let Err(err) = axum::serve(gateway_listener, gateway_app).await {
            tracing::error!(%err, "order gateway server error");
        }
    });
    let stream_app = stream::router(subscribers);
    let stream_server = tokio::spawn(async move {
        if let Err(err) = axum::serve(stream_listener, stream_app).await {
            tracing::error!(%err, "event stream server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    // Finalize at most one partial round and emit the terminal
    // tournament standings before tearing the listeners down.
    handle.interrupt().await;
    core_task.await?;
    dispatcher.await?;

    gateway_server.abort();
    stream_server.abort();
    info!("shutdown complete");
    Ok(())
}

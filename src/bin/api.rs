//! Composition root for the read-only HTTP/WebSocket surface. Does not
//! touch the broker; reads come from Postgres, live WS updates arrive by
//! subscribing to the KV pub-sub channel and re-broadcasting to this
//! process's own WS sessions.

use std::fs::File;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use icon_blocks_indexer::api::{build_router, AppState};
use icon_blocks_indexer::broadcaster::Broadcaster;
use icon_blocks_indexer::config::Config;
use icon_blocks_indexer::observability::Observability;
use icon_blocks_indexer::{db, kv, metrics};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let log_file = if config.log_to_file {
        Some(File::create(&config.log_file_name)?)
    } else {
        None
    };
    let _observability = Observability::init(
        vec!["indexer_api".to_string()],
        LevelFilter::from(config.log_level),
        log_file,
    )?;
    config.print();

    metrics::install(config.metrics_port)?;

    let pool = db::connect(&config.db).await?;
    let kv_store = kv::RedisKv::connect(&config.kv).await?;
    let broadcaster = Broadcaster::new();

    spawn_pubsub_bridge(kv_store.clone(), broadcaster.clone());

    let state = Arc::new(AppState {
        pool,
        kv: kv_store,
        broadcaster,
        config: config.clone(),
    });

    let app = build_router(state);
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "indexer api listening");

    let health_router = Router::new().route(&config.health_prefix, get(health));
    let health_listener = TcpListener::bind(("0.0.0.0", config.health_port)).await?;
    tracing::info!(port = config.health_port, "health endpoint listening");

    let app_server = axum::serve(listener, app);
    let health_server = axum::serve(health_listener, health_router);

    tokio::select! {
        result = app_server => result?,
        result = health_server => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Forwards every message published on the external KV channel into this
/// process's in-process broadcaster, so WS sessions connected to this
/// replica see updates produced by loaders running in the worker process.
fn spawn_pubsub_bridge(kv_store: kv::RedisKv, broadcaster: Broadcaster) {
    let (tx, mut rx) = mpsc::channel::<String>(64);

    tokio::spawn(async move {
        loop {
            if let Err(err) = kv_store.subscribe_forwarding(tx.clone()).await {
                tracing::warn!(error = %err, "pub-sub bridge disconnected, retrying in 3s");
                tokio::time::sleep(std::time::Duration::from_secs(3)).await;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            match serde_json::from_str(&payload) {
                Ok(projection) => broadcaster.publish(projection),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed ws projection from pub-sub");
                }
            }
        }
    });
}

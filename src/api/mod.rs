//! HTTP/WebSocket surface. Thin: the core pipeline does not depend on this
//! surface's correctness, but its contracts (status codes, header names,
//! payload shapes) are honored here.

mod routes;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::kv::RedisKv;

pub struct AppState {
    pub pool: PgPool,
    pub kv: RedisKv,
    pub broadcaster: Broadcaster,
    pub config: Config,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any);

    let rest_prefix = state.config.rest_prefix.clone();
    let websocket_prefix = state.config.websocket_prefix.clone();
    let health_prefix = state.config.health_prefix.clone();

    Router::new()
        .route(&format!("{rest_prefix}/blocks"), get(routes::list_blocks))
        .route(
            &format!("{rest_prefix}/blocks/:number"),
            get(routes::get_block),
        )
        .route("/version", get(routes::version))
        .route("/metadata", get(routes::metadata))
        .route(
            &format!("{websocket_prefix}/blocks/"),
            get(ws::upgrade),
        )
        .route(&health_prefix, get(routes::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

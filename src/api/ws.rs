use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

use crate::api::AppState;

/// Upgrades to a WebSocket and writes every published block projection as a
/// text frame. The peer is read from only to detect close; any inbound
/// frame is ignored.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle(mut socket: WebSocket, state: Arc<AppState>) {
    let mut receiver = state.broadcaster.subscribe();

    loop {
        tokio::select! {
            projection = receiver.recv() => {
                match projection {
                    Ok(projection) => {
                        let payload = match serde_json::to_string(&projection) {
                            Ok(payload) => payload,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to encode ws projection");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "ws session lagged behind the broadcaster");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(_)) => continue,
                    _ => return,
                }
            }
        }
    }
}

//! WebSocket surface.
//!
//! The network is fixed per connection from the upgrade request's `Host`. Every text message is
//! one JSON-RPC request answered independently, so replies may arrive out of order; clients
//! correlate them by `id`.

use crate::router::{host, AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use keel_core::types::JsonRpcRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub fn create_ws_router(state: Arc<AppState>) -> Router {
    Router::new().route("/", get(handle_ws_upgrade)).with_state(state)
}

pub async fn handle_ws_upgrade(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let host = host(&headers).to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, host))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, host: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            if sink.send(Message::Text(reply.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Message::Close(_) => break,
            _ => continue,
        };

        let state = Arc::clone(&state);
        let host = host.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(reply) = answer(&state, &host, &text).await {
                // receiver is gone once the client disconnected
                let _ = tx.send(reply);
            }
        });
    }

    drop(tx);
    if let Err(e) = writer.await {
        warn!(error = %e, "websocket writer task failed");
    }
}

/// Reply to one WebSocket message, or `None` if the message is not JSON.
pub async fn answer(state: &AppState, host: &str, text: &str) -> Option<String> {
    let Ok(data) = serde_json::from_str::<Value>(text) else {
        debug!("dropping unparseable websocket message");
        return None;
    };
    let jsonrpc = data.get("jsonrpc").cloned().unwrap_or(Value::Null);
    let id = data.get("id").cloned().unwrap_or(Value::Null);

    let Some(ctx) = state.registry.resolve_host(host) else {
        return Some(json!({ "jsonrpc": jsonrpc, "id": id, "message": "Invalid network" }).to_string());
    };

    let outcome = match JsonRpcRequest::deserialize(&data) {
        Ok(request) => {
            let method = request.method.clone();
            ctx.handle(request)
                .await
                .map(|response| (method, response))
                .map_err(|e| e.to_string())
        }
        Err(e) => Err(format!("Invalid request: {e}")),
    };

    match outcome {
        Ok((method, response)) => {
            state.requests.record(&method);
            match serde_json::to_string(&response) {
                Ok(reply) => Some(reply),
                Err(e) => Some(json!({ "id": id, "jsonrpc": jsonrpc, "err": e.to_string() }).to_string()),
            }
        }
        Err(err) => Some(json!({ "id": id, "jsonrpc": jsonrpc, "err": err }).to_string()),
    }
}

//! WebSocket transport for tracker clients.
//!
//! ## Connection lifecycle
//!
//! 1. Client connects to `GET /api/ws` and the socket is upgraded.
//! 2. All messages are JSON objects with a `"type"` field. An optional
//!    `"request_id"` on any incoming message is echoed on the corresponding
//!    response, enabling correlation in async clients.
//! 3. Tracker broadcast events are forwarded to every connected client as
//!    they happen.
//!
//! ## Message types (client → server)
//!
//! | Type                    | Fields | Response type(s)             |
//! |-------------------------|--------|------------------------------|
//! | `ping`                  | —      | `pong`                       |
//! | `tracker.get`           | —      | `tracker.view`               |
//! | `tracker.copy`          | —      | `tracker.copy.ack` or `error`|
//! | `tracker.clear_history` | —      | `tracker.clear_history.ack`  |
//!
//! ## Message types (server → client)
//!
//! | Type                        | Key fields                          |
//! |-----------------------------|-------------------------------------|
//! | `pong`                      | —                                   |
//! | `tracker.view`              | `view` (null before Ready)          |
//! | `tracker.copy.ack`          | `copied`, `text`                    |
//! | `tracker.clear_history.ack` | —                                   |
//! | `tracker.position`          | `latitude`, `longitude`, `accuracy` |
//! | `tracker.error`             | `message`                           |
//! | `tracker.copied`            | `copied`                            |
//! | `tracker.history_cleared`   | —                                   |
//! | `error`                     | `code`, `message`                   |

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::actions::{self, CopyOutcome};
use crate::{view, AppState};

/// `GET /api/ws` — WebSocket upgrade handler.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Render the current tracker view as a `tracker.view` message.
async fn view_message(state: &AppState, request_id: Option<&str>) -> Value {
    let tracker = state.tracker.lock().await;
    let rendered = view::render(&tracker)
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or(Value::Null);
    let mut msg = json!({"type": "tracker.view", "view": rendered});
    if let Some(rid) = request_id {
        msg["request_id"] = json!(rid);
    }
    msg
}

/// Main WebSocket event loop.
///
/// Splits the socket into a sink (outgoing) and stream (incoming). Outgoing
/// messages are funneled through an mpsc channel so the broadcast forwarder
/// can send without holding a reference to the socket.
///
/// Uses `tokio::select!` to concurrently process:
/// - Incoming WebSocket messages from the client
/// - Broadcast tracker events from the watcher and other connections
async fn handle_ws(socket: axum::extract::ws::WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Channel for sending messages back to the WebSocket
    let (tx, mut rx) = mpsc::channel::<Value>(256);

    // Subscribe to tracker broadcasts
    let mut broadcast_rx = state.tracker_events.subscribe();

    debug!("ws client connected");

    // Task: forward channel messages to WebSocket sink
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    error!("WS send: failed to serialize message: {e}");
                    continue;
                }
            };
            if ws_sink
                .send(axum::extract::ws::Message::Text(text.into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Process incoming messages and broadcast events concurrently
    loop {
        tokio::select! {
            ws_msg = ws_stream.next() => {
                let Some(Ok(msg)) = ws_msg else { break };
                match msg {
                    axum::extract::ws::Message::Text(text) => {
                        let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
                            let _ = tx
                                .send(json!({
                                    "type": "error",
                                    "code": "INVALID_JSON",
                                    "message": "Failed to parse JSON message"
                                }))
                                .await;
                            continue;
                        };

                        let msg_type = parsed["type"].as_str().unwrap_or("");
                        let request_id = parsed["request_id"].as_str().map(ToString::to_string);

                        match msg_type {
                            "ping" => {
                                let mut resp = json!({"type": "pong"});
                                if let Some(ref rid) = request_id {
                                    resp["request_id"] = json!(rid);
                                }
                                let _ = tx.send(resp).await;
                            }
                            "tracker.get" => {
                                let msg = view_message(&state, request_id.as_deref()).await;
                                let _ = tx.send(msg).await;
                            }
                            "tracker.copy" => {
                                let mut resp = match actions::copy_current(&state).await {
                                    CopyOutcome::Copied { text } => {
                                        json!({"type": "tracker.copy.ack", "copied": true, "text": text})
                                    }
                                    CopyOutcome::CopyFailed { text } => {
                                        json!({"type": "tracker.copy.ack", "copied": false, "text": text})
                                    }
                                    CopyOutcome::NoPosition => json!({
                                        "type": "error",
                                        "code": "NO_POSITION",
                                        "message": "no current position to copy"
                                    }),
                                };
                                if let Some(ref rid) = request_id {
                                    resp["request_id"] = json!(rid);
                                }
                                let _ = tx.send(resp).await;
                            }
                            "tracker.clear_history" => {
                                actions::clear_history(&state).await;
                                let mut resp = json!({"type": "tracker.clear_history.ack"});
                                if let Some(ref rid) = request_id {
                                    resp["request_id"] = json!(rid);
                                }
                                let _ = tx.send(resp).await;
                            }
                            other => {
                                let _ = tx
                                    .send(json!({
                                        "type": "error",
                                        "code": "UNKNOWN_TYPE",
                                        "message": format!("Unknown message type: {other}")
                                    }))
                                    .await;
                            }
                        }
                    }
                    axum::extract::ws::Message::Close(_) => break,
                    _ => {} // ignore binary/ping/pong frames
                }
            }
            event = broadcast_rx.recv() => {
                match event {
                    Ok(value) => {
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        let _ = tx
                            .send(json!({
                                "type": "error",
                                "code": "LAGGED",
                                "message": format!("Missed {n} events")
                            }))
                            .await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("ws client disconnected");
    send_task.abort();
}

//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use crate::clipboard::ClipboardSink;
use crate::config::Config;
use crate::source::PositionSource;
use crate::tracker::TrackerState;

/// Shared application state for the geotrackd server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// The tracker state machine, mutated by the watcher and user actions.
    pub tracker: Arc<Mutex<TrackerState>>,
    /// Broadcast channel for tracker events (position, error, copied,
    /// history_cleared). SSE and WS clients subscribe to it.
    pub tracker_events: broadcast::Sender<Value>,
    /// The position source backing the watch.
    pub source: Arc<dyn PositionSource>,
    /// Clipboard sink for the copy action.
    pub clipboard: Arc<dyn ClipboardSink>,
    /// Current number of SSE connections (for connection limiting).
    pub sse_connections: Arc<AtomicU32>,
}

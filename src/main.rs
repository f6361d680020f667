#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # geotrackd
//!
//! Live geolocation tracker daemon.
//!
//! geotrackd subscribes to a continuous position source (a gpsd daemon, or
//! a fixed test position), keeps the current fix plus a bounded history in
//! memory, and serves rendered views to a browser over HTTP, SSE, and
//! WebSocket. The embedded status page at `/` is the UI.
//!
//! ## API surface
//!
//! | Method | Path                   | Description                         |
//! |--------|------------------------|-------------------------------------|
//! | GET    | `/`                    | Embedded status page                |
//! | GET    | `/api/health`          | Liveness probe + tracker summary    |
//! | GET    | `/api/tracker`         | Rendered tracker view               |
//! | POST   | `/api/tracker/copy`    | Copy current coordinates            |
//! | DELETE | `/api/tracker/history` | Clear the history log               |
//! | GET    | `/api/events`          | SSE stream of tracker events        |
//! | GET    | `/api/ws`              | WebSocket event stream + actions    |
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap subcommands, router setup, graceful shutdown
//! config.rs        — TOML + env-var configuration
//! state.rs         — shared AppState
//! tracker.rs       — tracker state machine (phases, history, copied flag)
//! watcher.rs       — background watch lifecycle, Ready gate, handle release
//! source/
//!   mod.rs         — PositionSource trait, WatchOptions, WatchError
//!   gpsd.rs        — gpsd JSON-over-TCP source
//!   constant.rs    — fixed-position source for demos and tests
//! format.rs        — display formatting rules
//! view.rs          — rendered view assembly
//! map.rs           — OpenStreetMap embed URL
//! clipboard.rs     — host clipboard sink
//! actions.rs       — copy / clear-history shared by HTTP and WS
//! routes/
//!   health.rs      — GET /api/health
//!   tracker.rs     — GET /api/tracker, POST copy, DELETE history
//!   events.rs      — GET /api/events (SSE)
//!   ui.rs          — GET / (embedded page)
//! ws/
//!   mod.rs         — WebSocket upgrade, message dispatch, event forwarding
//! ```

use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{delete, get, post},
    Router,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use geotrackd::clipboard::OsClipboard;
use geotrackd::config::{Config, SourceKind};
use geotrackd::source::{
    constant::ConstantSource, gpsd::GpsdSource, PositionSource, UnsupportedSource,
};
use geotrackd::tracker::TrackerState;
use geotrackd::{routes, watcher, ws, AppState};

/// Live geolocation tracker daemon.
#[derive(Parser)]
#[command(name = "geotrackd", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WS server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => {
            run_server(config.as_deref()).await;
        }
        None => {
            run_server(None).await;
        }
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = Config::load(config_path);

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("geotrackd v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);

    let source: Arc<dyn PositionSource> = match config.source {
        Some(ref sc) => match sc.kind {
            SourceKind::Gpsd => {
                info!("Position source: gpsd at {}:{}", sc.host, sc.port);
                Arc::new(GpsdSource::new(&sc.host, sc.port))
            }
            SourceKind::Constant => {
                info!(
                    "Position source: constant {},{}",
                    sc.latitude, sc.longitude
                );
                Arc::new(ConstantSource::new(sc.latitude, sc.longitude, sc.interval_ms))
            }
        },
        None => {
            info!("No position source configured");
            Arc::new(UnsupportedSource)
        }
    };

    let (tracker_events, _) = broadcast::channel(256);

    let state = AppState {
        config: Arc::new(config),
        start_time: Instant::now(),
        tracker: Arc::new(Mutex::new(TrackerState::new())),
        tracker_events,
        source,
        clipboard: Arc::new(OsClipboard),
        sse_connections: Arc::new(AtomicU32::new(0)),
    };

    // Build router
    let app = Router::new()
        .route("/", get(routes::ui::index))
        .route("/api/health", get(routes::health::health))
        .route("/api/tracker", get(routes::tracker::get_view))
        .route("/api/tracker/copy", post(routes::tracker::copy))
        .route("/api/tracker/history", delete(routes::tracker::clear_history))
        .route("/api/events", get(routes::events::event_stream))
        .route("/api/ws", get(ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // The watch only starts once the server is up: the watcher holds on the
    // Ready gate until this signal.
    let (ready_tx, ready_rx) = oneshot::channel();
    let watcher_task = watcher::spawn_watcher(
        state.source.clone(),
        state.tracker.clone(),
        state.tracker_events.clone(),
        ready_rx,
    );
    let _ = ready_tx.send(());

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    // Cleanup
    info!("Shutting down...");
    watcher_task.abort();
    watcher::release(&state.source, &state.tracker).await;
    info!("Goodbye");
}

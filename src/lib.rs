#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]

//! geotrackd library — exposes the tracker building blocks for the binary
//! and for integration tests.
//!
//! - `tracker` — the tracker state machine (current fix, bounded history)
//! - `source` — position source trait, gpsd and constant implementations
//! - `watcher` — background watch lifecycle
//! - `format` / `view` — the rendering contract
//! - `map` — OpenStreetMap embed URL construction
//! - `clipboard` — clipboard sink for the copy action
//! - `actions` — user actions shared by HTTP and WS surfaces
//! - `routes` / `ws` — HTTP, SSE, and WebSocket handlers
//! - `config` — configuration loading

pub mod actions;
pub mod clipboard;
pub mod config;
pub mod format;
pub mod map;
pub mod routes;
pub mod source;
pub mod state;
pub mod tracker;
pub mod util;
pub mod view;
pub mod watcher;
pub mod ws;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use state::AppState;
pub use tracker::{PositionSample, TrackerState};

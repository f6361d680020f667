//! Health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// `GET /api/health` — liveness probe.
///
/// Returns status, uptime, version, and a tracker summary. Suitable for
/// load-balancer health checks.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();

    let tracker = state.tracker.lock().await;
    let has_position = tracker.current.is_some();
    let position_age_secs = tracker
        .current
        .as_ref()
        .map(|s| crate::util::epoch_ms().saturating_sub(s.timestamp_ms) / 1000);

    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "tracker": {
            "phase": tracker.phase,
            "watching": tracker.watching,
            "has_position": has_position,
            "position_age_secs": position_age_secs,
            "history_len": tracker.history.len(),
            "samples_total": tracker.samples_total,
            "errors_total": tracker.errors_total,
            "last_error": tracker.error,
        },
    }))
}

//! Tracker view and action endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::actions::{self, CopyOutcome};
use crate::{view, AppState};

/// `GET /api/tracker` — the rendered tracker view.
///
/// Returns JSON `null` until the Ready gate has passed, an error-only
/// object while a watch error is stored, and the full data view otherwise.
pub async fn get_view(State(state): State<AppState>) -> Json<Value> {
    let tracker = state.tracker.lock().await;
    match view::render(&tracker) {
        Some(v) => Json(serde_json::to_value(v).unwrap_or(Value::Null)),
        None => Json(Value::Null),
    }
}

/// `POST /api/tracker/copy` — copy the current coordinates.
///
/// Writes `"<latitude>, <longitude>"` (raw values) to the clipboard sink.
/// Returns 409 when there is no current fix. A clipboard failure is not an
/// HTTP error: the action degrades silently and `copied` stays false.
pub async fn copy(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match actions::copy_current(&state).await {
        CopyOutcome::Copied { text } => Ok(Json(json!({"copied": true, "text": text}))),
        CopyOutcome::CopyFailed { text } => Ok(Json(json!({"copied": false, "text": text}))),
        CopyOutcome::NoPosition => Err((
            StatusCode::CONFLICT,
            Json(json!({"error": "no current position to copy"})),
        )),
    }
}

/// `DELETE /api/tracker/history` — clear the history log.
///
/// Leaves the current fix, watch, and error untouched.
pub async fn clear_history(State(state): State<AppState>) -> Json<Value> {
    actions::clear_history(&state).await;
    Json(json!({"cleared": true}))
}

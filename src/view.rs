//! Rendered tracker views.
//!
//! [`render`] turns the locked tracker state into the exact output every
//! surface shows. Before the Ready gate passes, nothing is rendered; with
//! an error stored, only the error message is; otherwise the full data
//! view, with the map panel present iff a current fix exists.

use serde::Serialize;

use crate::format;
use crate::map;
use crate::tracker::{PositionSample, TrackerPhase, TrackerState};

/// Everything a client renders for the tracker.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TrackerView {
    Error(ErrorView),
    Data(DataView),
}

#[derive(Debug, Serialize)]
pub struct ErrorView {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct DataView {
    /// `active` / `inactive`, bound to the watching flag.
    pub status: &'static str,
    pub watching: bool,
    /// Transient copy indicator for the copy button.
    pub copied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionView>,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<MapView>,
}

/// Formatted fields of the current fix.
#[derive(Debug, Serialize)]
pub struct PositionView {
    pub latitude: String,
    pub longitude: String,
    pub speed: String,
    pub heading: String,
    pub accuracy: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub latitude: String,
    pub longitude: String,
    pub time: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct MapView {
    pub embed_url: String,
}

fn position_view(sample: &PositionSample) -> PositionView {
    PositionView {
        latitude: format::coordinate(sample.latitude),
        longitude: format::coordinate(sample.longitude),
        speed: format::speed(sample.speed),
        heading: format::heading(sample.heading),
        accuracy: format::accuracy(sample.accuracy),
        updated_at: format::clock(sample.timestamp_ms),
    }
}

/// Render the tracker. `None` until the Ready gate has passed.
#[must_use]
pub fn render(state: &TrackerState) -> Option<TrackerView> {
    if state.phase == TrackerPhase::Uninitialized {
        return None;
    }

    if let Some(ref error) = state.error {
        return Some(TrackerView::Error(ErrorView {
            error: error.clone(),
        }));
    }

    // History panel lists most-recent-first.
    let history = state
        .history
        .iter()
        .rev()
        .map(|s| HistoryEntry {
            latitude: format::coordinate(s.latitude),
            longitude: format::coordinate(s.longitude),
            time: format::clock(s.timestamp_ms),
            timestamp_ms: s.timestamp_ms,
        })
        .collect();

    let map = state.current.as_ref().map(|s| MapView {
        embed_url: map::embed_url(s.latitude, s.longitude),
    });

    Some(TrackerView::Data(DataView {
        status: if state.watching { "active" } else { "inactive" },
        watching: state.watching,
        copied: state.copied,
        position: state.current.as_ref().map(position_view),
        history,
        map,
    }))
}

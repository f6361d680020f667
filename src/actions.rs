//! User actions shared by the HTTP and WebSocket surfaces.

use serde_json::json;
use tracing::debug;

use crate::format;
use crate::tracker::COPIED_RESET_MS;
use crate::AppState;

/// Result of a copy action.
pub enum CopyOutcome {
    /// Clipboard write succeeded; the copied indicator is set.
    Copied { text: String },
    /// Clipboard write failed; the indicator stays off.
    CopyFailed { text: String },
    /// No current fix to copy.
    NoPosition,
}

/// Copy the current coordinates (`"<latitude>, <longitude>"`, raw values)
/// to the clipboard sink. On success, sets the copied indicator and
/// schedules its reset; the indicator is cleared after
/// [`COPIED_RESET_MS`] unless a newer copy has superseded this one.
pub async fn copy_current(state: &AppState) -> CopyOutcome {
    let text = {
        let tracker = state.tracker.lock().await;
        let Some(ref current) = tracker.current else {
            return CopyOutcome::NoPosition;
        };
        format::copy_payload(current.latitude, current.longitude)
    };

    match state.clipboard.write_text(&text).await {
        Ok(()) => {
            let seq = state.tracker.lock().await.begin_copy();
            let _ = state
                .tracker_events
                .send(json!({"type": "tracker.copied", "copied": true}));

            let tracker = state.tracker.clone();
            let events = state.tracker_events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(COPIED_RESET_MS)).await;
                if tracker.lock().await.expire_copy(seq) {
                    let _ = events.send(json!({"type": "tracker.copied", "copied": false}));
                }
            });

            CopyOutcome::Copied { text }
        }
        Err(e) => {
            debug!("clipboard write failed: {e}");
            CopyOutcome::CopyFailed { text }
        }
    }
}

/// Clear the history log. Current fix, watch, and error are untouched.
pub async fn clear_history(state: &AppState) {
    state.tracker.lock().await.clear_history();
    let _ = state
        .tracker_events
        .send(json!({"type": "tracker.history_cleared"}));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Instant;

    use tokio::sync::{broadcast, Mutex};

    use super::*;
    use crate::clipboard::ClipboardSink;
    use crate::config::{Config, LoggingConfig, ServerConfig};
    use crate::source::UnsupportedSource;
    use crate::tracker::{PositionSample, TrackerState};

    struct RecordingClipboard {
        writes: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ClipboardSink for RecordingClipboard {
        async fn write_text(&self, text: &str) -> Result<(), String> {
            if self.fail {
                return Err("no clipboard tool found".to_string());
            }
            self.writes.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn app_state(fail_clipboard: bool) -> (AppState, Arc<RecordingClipboard>) {
        let clipboard = Arc::new(RecordingClipboard {
            writes: Mutex::new(Vec::new()),
            fail: fail_clipboard,
        });
        let (tracker_events, _) = broadcast::channel(16);
        let state = AppState {
            config: Arc::new(Config {
                server: ServerConfig::default(),
                source: None,
                logging: LoggingConfig::default(),
            }),
            start_time: Instant::now(),
            tracker: Arc::new(Mutex::new(TrackerState::new())),
            tracker_events,
            source: Arc::new(UnsupportedSource),
            clipboard: clipboard.clone(),
            sse_connections: Arc::new(AtomicU32::new(0)),
        };
        (state, clipboard)
    }

    fn sample() -> PositionSample {
        PositionSample {
            latitude: 1.5,
            longitude: -2.25,
            accuracy: 5.0,
            speed: None,
            heading: None,
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn copy_writes_raw_coordinates_and_sets_indicator() {
        let (state, clipboard) = app_state(false);
        state.tracker.lock().await.push_sample(sample());

        match copy_current(&state).await {
            CopyOutcome::Copied { text } => assert_eq!(text, "1.5, -2.25"),
            _ => panic!("expected a successful copy"),
        }
        assert_eq!(clipboard.writes.lock().await.as_slice(), ["1.5, -2.25"]);
        assert!(state.tracker.lock().await.copied);
    }

    #[tokio::test(start_paused = true)]
    async fn copied_indicator_resets_after_the_delay() {
        let (state, _clipboard) = app_state(false);
        state.tracker.lock().await.push_sample(sample());

        assert!(matches!(
            copy_current(&state).await,
            CopyOutcome::Copied { .. }
        ));
        assert!(state.tracker.lock().await.copied);

        tokio::time::sleep(tokio::time::Duration::from_millis(COPIED_RESET_MS + 10)).await;
        assert!(!state.tracker.lock().await.copied);
    }

    #[tokio::test(start_paused = true)]
    async fn a_second_copy_outlives_the_first_timer() {
        let (state, _clipboard) = app_state(false);
        state.tracker.lock().await.push_sample(sample());

        assert!(matches!(
            copy_current(&state).await,
            CopyOutcome::Copied { .. }
        ));
        // Halfway through the first window, copy again.
        tokio::time::sleep(tokio::time::Duration::from_millis(COPIED_RESET_MS / 2)).await;
        assert!(matches!(
            copy_current(&state).await,
            CopyOutcome::Copied { .. }
        ));
        // The first timer fires now; the indicator must survive it.
        tokio::time::sleep(tokio::time::Duration::from_millis(COPIED_RESET_MS / 2 + 10)).await;
        assert!(state.tracker.lock().await.copied);
        // And the second timer clears it.
        tokio::time::sleep(tokio::time::Duration::from_millis(COPIED_RESET_MS / 2)).await;
        assert!(!state.tracker.lock().await.copied);
    }

    #[tokio::test]
    async fn copy_without_position_is_rejected() {
        let (state, clipboard) = app_state(false);
        assert!(matches!(copy_current(&state).await, CopyOutcome::NoPosition));
        assert!(clipboard.writes.lock().await.is_empty());
        assert!(!state.tracker.lock().await.copied);
    }

    #[tokio::test]
    async fn clipboard_failure_degrades_silently() {
        let (state, _clipboard) = app_state(true);
        state.tracker.lock().await.push_sample(sample());

        match copy_current(&state).await {
            CopyOutcome::CopyFailed { text } => assert_eq!(text, "1.5, -2.25"),
            _ => panic!("expected a degraded copy"),
        }
        assert!(!state.tracker.lock().await.copied);
    }

    #[tokio::test]
    async fn clear_history_broadcasts_and_keeps_current() {
        let (state, _clipboard) = app_state(false);
        state.tracker.lock().await.push_sample(sample());
        let mut rx = state.tracker_events.subscribe();

        clear_history(&state).await;

        let tracker = state.tracker.lock().await;
        assert!(tracker.history.is_empty());
        assert!(tracker.current.is_some());
        let event = rx.recv().await.unwrap();
        assert_eq!(event["type"], "tracker.history_cleared");
    }
}

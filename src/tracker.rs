//! Tracker state machine: current fix, bounded history, watch lifecycle.
//!
//! All mutation happens under one `Mutex` held by [`crate::AppState`], so a
//! sample delivery (set current, append + trim history, clear error) is
//! atomic with respect to every render path.

use std::collections::VecDeque;

use serde::Serialize;

use crate::source::WatchId;

/// Hard cap on retained history entries; oldest is evicted first.
pub const HISTORY_CAP: usize = 50;

/// How long the copied indicator stays set after a successful copy.
pub const COPIED_RESET_MS: u64 = 2000;

/// A single position reading delivered by the watch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
    /// Ground speed in m/s, when the source reports one.
    pub speed: Option<f64>,
    /// Course over ground in degrees (0–360), when the source reports one.
    pub heading: Option<f64>,
    /// Capture time, epoch milliseconds.
    pub timestamp_ms: u64,
}

/// Initialization phases of the tracker.
///
/// The watch is only started from `Ready`; starting it before the service
/// shell has finished coming up would let a fix land ahead of the first
/// observable render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerPhase {
    /// Service still starting; render nothing.
    Uninitialized,
    /// Startup complete, watch not yet running.
    Ready,
    /// A continuous watch has been started.
    Subscribed,
}

/// Shared tracker state updated by the background watcher and user actions.
pub struct TrackerState {
    pub phase: TrackerPhase,
    pub current: Option<PositionSample>,
    /// Last watch error message. Set implies the subscription is inactive.
    pub error: Option<String>,
    /// True while the watch is live and no error has occurred since it started.
    pub watching: bool,
    pub history: VecDeque<PositionSample>,
    /// Transient indicator set after a successful clipboard copy.
    pub copied: bool,
    /// Handle of the active watch, released exactly once via [`Self::release_watch`].
    pub watch: Option<WatchId>,
    pub samples_total: u64,
    pub errors_total: u64,
    copy_seq: u64,
}

impl TrackerState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: TrackerPhase::Uninitialized,
            current: None,
            error: None,
            watching: false,
            history: VecDeque::with_capacity(HISTORY_CAP),
            copied: false,
            watch: None,
            samples_total: 0,
            errors_total: 0,
            copy_seq: 0,
        }
    }

    /// Enter `Ready`. Called once when the service shell finishes starting.
    pub fn mark_ready(&mut self) {
        if self.phase == TrackerPhase::Uninitialized {
            self.phase = TrackerPhase::Ready;
        }
    }

    /// Record the started watch and enter `Subscribed`.
    pub fn begin_watch(&mut self, id: WatchId) {
        self.phase = TrackerPhase::Subscribed;
        self.watch = Some(id);
        self.watching = true;
    }

    /// Apply one delivered sample: set current, append, trim, clear error.
    ///
    /// `watching` is deliberately untouched: an error since the watch
    /// started leaves it false even if fixes later resume.
    pub fn push_sample(&mut self, sample: PositionSample) {
        if self.history.len() >= HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(sample.clone());
        self.current = Some(sample);
        self.error = None;
        self.samples_total += 1;
    }

    /// Record a watch failure. The subscription is not retried.
    pub fn set_error(&mut self, msg: String) {
        self.error = Some(msg);
        self.watching = false;
        self.errors_total += 1;
    }

    /// Take the held watch handle for release. Returns `None` on every call
    /// after the first, which is what makes the stop-watch call exactly-once.
    pub fn release_watch(&mut self) -> Option<WatchId> {
        self.watching = false;
        self.watch.take()
    }

    /// Empty the history log. Current fix, watch, and error are untouched.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Set the copied indicator and return the reset token for this copy.
    pub fn begin_copy(&mut self) -> u64 {
        self.copy_seq += 1;
        self.copied = true;
        self.copy_seq
    }

    /// Clear the copied indicator, but only if `seq` belongs to the latest
    /// copy; a stale timer firing after a newer copy is ignored. Returns
    /// whether the indicator was cleared.
    pub fn expire_copy(&mut self, seq: u64) -> bool {
        if self.copy_seq == seq && self.copied {
            self.copied = false;
            return true;
        }
        false
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: u64) -> PositionSample {
        PositionSample {
            latitude: 45.0 + n as f64 * 0.001,
            longitude: -73.0,
            accuracy: 5.0,
            speed: None,
            heading: None,
            timestamp_ms: 1_700_000_000_000 + n,
        }
    }

    #[test]
    fn history_never_exceeds_cap_and_keeps_newest() {
        let mut state = TrackerState::new();
        for n in 0..130 {
            state.push_sample(sample(n));
            assert!(state.history.len() <= HISTORY_CAP);
        }
        assert_eq!(state.history.len(), HISTORY_CAP);
        // Oldest retained entry is the 80th delivery, newest the 129th.
        assert_eq!(state.history.front().unwrap().timestamp_ms, sample(80).timestamp_ms);
        assert_eq!(state.history.back().unwrap().timestamp_ms, sample(129).timestamp_ms);
        // Arrival order is preserved.
        let stamps: Vec<u64> = state.history.iter().map(|s| s.timestamp_ms).collect();
        let mut sorted = stamps.clone();
        sorted.sort_unstable();
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn current_tracks_last_appended_entry() {
        let mut state = TrackerState::new();
        for n in 0..7 {
            state.push_sample(sample(n));
            assert_eq!(state.current.as_ref(), state.history.back());
        }
    }

    #[test]
    fn sample_clears_error_but_not_watching() {
        let mut state = TrackerState::new();
        state.begin_watch(WatchId::new());
        state.set_error("position unavailable".into());
        assert!(!state.watching);
        state.push_sample(sample(0));
        assert!(state.error.is_none());
        assert!(!state.watching);
    }

    #[test]
    fn clear_history_leaves_everything_else() {
        let mut state = TrackerState::new();
        state.begin_watch(WatchId::new());
        state.push_sample(sample(0));
        state.push_sample(sample(1));
        state.clear_history();
        assert!(state.history.is_empty());
        assert!(state.current.is_some());
        assert!(state.watching);
        assert!(state.error.is_none());
    }

    #[test]
    fn release_watch_is_exactly_once() {
        let mut state = TrackerState::new();
        let id = WatchId::new();
        state.begin_watch(id);
        assert_eq!(state.release_watch(), Some(id));
        assert_eq!(state.release_watch(), None);
        assert!(!state.watching);
    }

    #[test]
    fn stale_copy_timer_does_not_clear_newer_copy() {
        let mut state = TrackerState::new();
        let first = state.begin_copy();
        let second = state.begin_copy();
        assert!(!state.expire_copy(first));
        assert!(state.copied);
        assert!(state.expire_copy(second));
        assert!(!state.copied);
    }

    #[test]
    fn ready_gate_is_one_way() {
        let mut state = TrackerState::new();
        state.mark_ready();
        assert_eq!(state.phase, TrackerPhase::Ready);
        state.begin_watch(WatchId::new());
        state.mark_ready();
        assert_eq!(state.phase, TrackerPhase::Subscribed);
    }
}

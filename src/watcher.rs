//! Background watch lifecycle.
//!
//! One task drives the whole subscription: it waits for the Ready gate,
//! runs the capability check, starts the continuous watch, and forwards
//! deliveries into [`TrackerState`] in arrival order. Failures are
//! terminal: the watch is never restarted; a service restart is the
//! remount. The held handle is released exactly once via [`release`].

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::source::{PositionSource, WatchEvent, WatchOptions, NOT_SUPPORTED_MSG};
use crate::tracker::TrackerState;

/// Spawn the watcher. Returns a `JoinHandle` for abort on shutdown.
pub fn spawn_watcher(
    source: Arc<dyn PositionSource>,
    tracker: Arc<Mutex<TrackerState>>,
    events: broadcast::Sender<Value>,
    ready: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // Phase 1: hold until the service shell has finished starting, so
        // no fix can land ahead of the first observable render.
        if ready.await.is_err() {
            return;
        }
        tracker.lock().await.mark_ready();

        // Capability check before any subscription attempt.
        if !source.supported() {
            warn!("position sensing unavailable on this host");
            tracker.lock().await.set_error(NOT_SUPPORTED_MSG.to_string());
            let _ = events.send(json!({
                "type": "tracker.error",
                "message": NOT_SUPPORTED_MSG,
            }));
            return;
        }

        // Phase 2: start the continuous watch.
        let watch = match source.start_watch(WatchOptions::default()).await {
            Ok(watch) => watch,
            Err(e) => {
                warn!("watch start failed: {e}");
                let msg = e.to_string();
                tracker.lock().await.set_error(msg.clone());
                let _ = events.send(json!({
                    "type": "tracker.error",
                    "message": msg,
                }));
                return;
            }
        };
        info!("watch {} started", watch.id);
        tracker.lock().await.begin_watch(watch.id);

        let mut stream = watch.events;
        while let Some(event) = stream.recv().await {
            match event {
                WatchEvent::Sample(sample) => {
                    debug!(
                        "fix {:.6},{:.6} ±{:.1}m",
                        sample.latitude, sample.longitude, sample.accuracy
                    );
                    let _ = events.send(json!({
                        "type": "tracker.position",
                        "latitude": sample.latitude,
                        "longitude": sample.longitude,
                        "accuracy": sample.accuracy,
                        "timestamp_ms": sample.timestamp_ms,
                    }));
                    tracker.lock().await.push_sample(sample);
                }
                WatchEvent::Failed(e) => {
                    warn!("watch failed: {e}");
                    let msg = e.to_string();
                    tracker.lock().await.set_error(msg.clone());
                    let _ = events.send(json!({
                        "type": "tracker.error",
                        "message": msg,
                    }));
                    break;
                }
            }
        }
    })
}

/// Release the held watch handle (shutdown path). The `take()` inside
/// [`TrackerState::release_watch`] makes the stop-watch call exactly-once
/// even if this races a second caller.
pub async fn release(source: &Arc<dyn PositionSource>, tracker: &Arc<Mutex<TrackerState>>) {
    let id = tracker.lock().await.release_watch();
    if let Some(id) = id {
        source.stop_watch(id).await;
        info!("watch {id} released");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;
    use crate::source::{Watch, WatchError, WatchId};
    use crate::tracker::{PositionSample, TrackerPhase};

    struct MockSource {
        supported: bool,
        stream: Mutex<Option<mpsc::Receiver<WatchEvent>>>,
        starts: AtomicUsize,
        stops: Mutex<Vec<WatchId>>,
    }

    impl MockSource {
        fn new(supported: bool, stream: Option<mpsc::Receiver<WatchEvent>>) -> Arc<Self> {
            Arc::new(Self {
                supported,
                stream: Mutex::new(stream),
                starts: AtomicUsize::new(0),
                stops: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl PositionSource for MockSource {
        fn supported(&self) -> bool {
            self.supported
        }

        async fn start_watch(&self, _options: WatchOptions) -> Result<Watch, WatchError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            match self.stream.lock().await.take() {
                Some(events) => Ok(Watch {
                    id: WatchId::new(),
                    events,
                }),
                None => Err(WatchError::PermissionDenied),
            }
        }

        async fn stop_watch(&self, id: WatchId) {
            self.stops.lock().await.push(id);
        }
    }

    fn sample(n: u64) -> PositionSample {
        PositionSample {
            latitude: 45.0,
            longitude: -73.0,
            accuracy: 5.0,
            speed: None,
            heading: None,
            timestamp_ms: n,
        }
    }

    async fn wait_until<F>(tracker: &Arc<Mutex<TrackerState>>, mut predicate: F)
    where
        F: FnMut(&TrackerState) -> bool,
    {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                if predicate(&*tracker.lock().await) {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn capability_absent_sets_fixed_error_without_subscribing() {
        let source = MockSource::new(false, None);
        let tracker = Arc::new(Mutex::new(TrackerState::new()));
        let (events, _) = broadcast::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = spawn_watcher(source.clone(), tracker.clone(), events, ready_rx);
        ready_tx.send(()).unwrap();
        task.await.unwrap();

        let state = tracker.lock().await;
        assert_eq!(state.error.as_deref(), Some(NOT_SUPPORTED_MSG));
        assert!(!state.watching);
        assert_eq!(source.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn samples_flow_in_order_after_the_gate() {
        let (tx, rx) = mpsc::channel(16);
        let source = MockSource::new(true, Some(rx));
        let tracker = Arc::new(Mutex::new(TrackerState::new()));
        let (events, _) = broadcast::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();

        let _task = spawn_watcher(source.clone(), tracker.clone(), events, ready_rx);
        assert_eq!(tracker.lock().await.phase, TrackerPhase::Uninitialized);
        ready_tx.send(()).unwrap();

        for n in 1..=3 {
            tx.send(WatchEvent::Sample(sample(n))).await.unwrap();
        }
        wait_until(&tracker, |s| s.samples_total == 3).await;

        let state = tracker.lock().await;
        assert_eq!(state.phase, TrackerPhase::Subscribed);
        assert!(state.watching);
        let stamps: Vec<u64> = state.history.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![1, 2, 3]);
        assert_eq!(state.current.as_ref().unwrap().timestamp_ms, 3);
    }

    #[tokio::test]
    async fn failure_is_terminal_and_stops_watching() {
        let (tx, rx) = mpsc::channel(16);
        let source = MockSource::new(true, Some(rx));
        let tracker = Arc::new(Mutex::new(TrackerState::new()));
        let (events, _) = broadcast::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = spawn_watcher(source.clone(), tracker.clone(), events, ready_rx);
        ready_tx.send(()).unwrap();

        tx.send(WatchEvent::Sample(sample(1))).await.unwrap();
        tx.send(WatchEvent::Failed(WatchError::Timeout)).await.unwrap();
        task.await.unwrap();

        let state = tracker.lock().await;
        assert_eq!(
            state.error.as_deref(),
            Some("timed out waiting for a position")
        );
        assert!(!state.watching);
        // The last delivered sample is retained.
        assert_eq!(state.current.as_ref().unwrap().timestamp_ms, 1);
        assert_eq!(source.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_stops_the_watch_exactly_once() {
        let (tx, rx) = mpsc::channel(16);
        let source = MockSource::new(true, Some(rx));
        let tracker = Arc::new(Mutex::new(TrackerState::new()));
        let (events, _) = broadcast::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = spawn_watcher(source.clone(), tracker.clone(), events, ready_rx);
        ready_tx.send(()).unwrap();
        tx.send(WatchEvent::Sample(sample(1))).await.unwrap();
        wait_until(&tracker, |s| s.samples_total == 1).await;

        task.abort();
        let dyn_source: Arc<dyn PositionSource> = source.clone();
        release(&dyn_source, &tracker).await;
        release(&dyn_source, &tracker).await;

        assert_eq!(source.stops.lock().await.len(), 1);
        assert!(!tracker.lock().await.watching);
    }
}

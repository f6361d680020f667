//! Fixed-position source for demos and hosts without a receiver.
//!
//! Emits the configured coordinates at a steady cadence with a synthetic
//! accuracy. Speed and heading are never reported.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::tracker::PositionSample;
use crate::util::epoch_ms;

use super::{PositionSource, Watch, WatchError, WatchEvent, WatchId, WatchOptions};

/// Synthetic accuracy reported with every sample, meters.
const CONSTANT_ACCURACY_M: f64 = 5.0;

pub struct ConstantSource {
    latitude: f64,
    longitude: f64,
    interval_ms: u64,
    watches: Mutex<HashMap<WatchId, tokio::task::JoinHandle<()>>>,
}

impl ConstantSource {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, interval_ms: u64) -> Self {
        Self {
            latitude,
            longitude,
            interval_ms,
            watches: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl PositionSource for ConstantSource {
    fn supported(&self) -> bool {
        true
    }

    async fn start_watch(&self, _options: WatchOptions) -> Result<Watch, WatchError> {
        let id = WatchId::new();
        let (tx, rx) = mpsc::channel(64);
        let (latitude, longitude) = (self.latitude, self.longitude);
        let interval = tokio::time::Duration::from_millis(self.interval_ms.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let sample = PositionSample {
                    latitude,
                    longitude,
                    accuracy: CONSTANT_ACCURACY_M,
                    speed: None,
                    heading: None,
                    timestamp_ms: epoch_ms(),
                };
                if tx.send(WatchEvent::Sample(sample)).await.is_err() {
                    return; // watch dropped
                }
            }
        });
        self.watches.lock().await.insert(id, task);

        debug!("constant watch {id} started at {latitude},{longitude}");
        Ok(Watch { id, events: rx })
    }

    async fn stop_watch(&self, id: WatchId) {
        if let Some(task) = self.watches.lock().await.remove(&id) {
            task.abort();
            debug!("constant watch {id} stopped");
        }
    }
}

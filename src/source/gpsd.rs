//! gpsd client source.
//!
//! Connects to a gpsd daemon over TCP, enables JSON watch mode, and turns
//! `TPV` reports into position samples. gpsd delivers full-precision GNSS
//! fixes regardless of the `high_accuracy` hint, so the hint is accepted
//! but does not change the wire exchange.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::tracker::PositionSample;
use crate::util::epoch_ms;

use super::{PositionSource, Watch, WatchError, WatchEvent, WatchId, WatchOptions};

/// Command that switches the gpsd session into streaming JSON mode.
const WATCH_ENABLE: &str = "?WATCH={\"enable\":true,\"json\":true};\n";

/// gpsd-backed position source.
pub struct GpsdSource {
    addr: String,
    watches: Mutex<HashMap<WatchId, tokio::task::JoinHandle<()>>>,
}

impl GpsdSource {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            watches: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl PositionSource for GpsdSource {
    fn supported(&self) -> bool {
        true
    }

    async fn start_watch(&self, options: WatchOptions) -> Result<Watch, WatchError> {
        let stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                WatchError::PermissionDenied
            } else {
                WatchError::Unavailable(format!("gpsd connect {}: {e}", self.addr))
            }
        })?;

        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(WATCH_ENABLE.as_bytes())
            .await
            .map_err(|e| WatchError::Unavailable(format!("gpsd watch command: {e}")))?;

        let id = WatchId::new();
        let (tx, rx) = mpsc::channel(64);
        let started_ms = epoch_ms();
        let task = tokio::spawn(read_loop(
            BufReader::new(reader),
            writer,
            tx,
            options,
            started_ms,
        ));
        self.watches.lock().await.insert(id, task);

        debug!("gpsd watch {id} started against {}", self.addr);
        Ok(Watch { id, events: rx })
    }

    async fn stop_watch(&self, id: WatchId) {
        if let Some(task) = self.watches.lock().await.remove(&id) {
            task.abort();
            debug!("gpsd watch {id} stopped");
        }
    }
}

/// Reader half of a watch: parses report lines until the socket closes.
///
/// The first-fix deadline is `options.timeout_ms`; once a fix has been
/// delivered, gpsd's own report cadence governs.
async fn read_loop(
    mut reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    // Held for the watch lifetime: dropping the write half would FIN the
    // socket and gpsd would stop streaming.
    _writer: tokio::net::tcp::OwnedWriteHalf,
    tx: mpsc::Sender<WatchEvent>,
    options: WatchOptions,
    started_ms: u64,
) {
    let deadline = tokio::time::Duration::from_millis(options.timeout_ms);
    let mut line = String::new();
    let mut have_fix = false;

    loop {
        line.clear();
        let read = if have_fix {
            reader.read_line(&mut line).await
        } else {
            match tokio::time::timeout(deadline, reader.read_line(&mut line)).await {
                Ok(read) => read,
                Err(_) => {
                    let _ = tx.send(WatchEvent::Failed(WatchError::Timeout)).await;
                    return;
                }
            }
        };

        match read {
            Ok(0) => {
                let _ = tx
                    .send(WatchEvent::Failed(WatchError::Unavailable(
                        "gpsd connection closed".to_string(),
                    )))
                    .await;
                return;
            }
            Ok(_) => {
                if let Some(sample) = parse_tpv(&line, &options, started_ms) {
                    have_fix = true;
                    if tx.send(WatchEvent::Sample(sample)).await.is_err() {
                        return; // watch dropped
                    }
                }
            }
            Err(e) => {
                warn!("gpsd read: {e}");
                let _ = tx
                    .send(WatchEvent::Failed(WatchError::Unavailable(format!(
                        "gpsd read: {e}"
                    ))))
                    .await;
                return;
            }
        }
    }
}

/// A gpsd report line. Only the fields the tracker consumes are decoded;
/// `VERSION`, `DEVICES`, `SKY`, and no-fix `TPV` reports are skipped.
#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    time: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    /// Estimated horizontal position error, meters.
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    /// Ground speed, m/s.
    speed: Option<f64>,
    /// Course over ground, degrees.
    track: Option<f64>,
}

/// Turn one report line into a sample, or `None` when the line carries no
/// admissible fix. Fixes older than the watch allows (cached fixes from
/// before watch start, under `maximum_age_ms = 0`) are dropped.
fn parse_tpv(line: &str, options: &WatchOptions, started_ms: u64) -> Option<PositionSample> {
    let report: Report = serde_json::from_str(line.trim()).ok()?;
    if report.class != "TPV" || report.mode < 2 {
        return None;
    }
    let latitude = report.lat?;
    let longitude = report.lon?;

    let timestamp_ms = report
        .time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map_or_else(epoch_ms, |t| {
            u64::try_from(t.timestamp_millis()).unwrap_or_default()
        });

    if timestamp_ms + options.maximum_age_ms < started_ms {
        debug!("gpsd: dropping cached fix from {timestamp_ms}");
        return None;
    }

    let accuracy = report
        .eph
        .or_else(|| match (report.epx, report.epy) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        })
        .unwrap_or(0.0);

    Some(PositionSample {
        latitude,
        longitude,
        accuracy,
        speed: report.speed,
        heading: report.track,
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> WatchOptions {
        WatchOptions::default()
    }

    #[test]
    fn parse_tpv_full_fix() {
        let line = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"time":"2026-08-08T15:32:33.000Z","lat":45.502,"lon":-73.567,"alt":47.0,"eph":4.2,"speed":5.0,"track":270.5}"#;
        let sample = parse_tpv(line, &options(), 0).unwrap();
        assert!((sample.latitude - 45.502).abs() < 1e-9);
        assert!((sample.longitude - (-73.567)).abs() < 1e-9);
        assert!((sample.accuracy - 4.2).abs() < 1e-9);
        assert_eq!(sample.speed, Some(5.0));
        assert_eq!(sample.heading, Some(270.5));
        assert_eq!(sample.timestamp_ms, 1_786_203_153_000);
    }

    #[test]
    fn parse_tpv_skips_no_fix_and_other_classes() {
        let no_fix = r#"{"class":"TPV","mode":1}"#;
        assert!(parse_tpv(no_fix, &options(), 0).is_none());
        let sky = r#"{"class":"SKY","satellites":[]}"#;
        assert!(parse_tpv(sky, &options(), 0).is_none());
        let version = r#"{"class":"VERSION","release":"3.25"}"#;
        assert!(parse_tpv(version, &options(), 0).is_none());
    }

    #[test]
    fn parse_tpv_drops_cached_fix_under_zero_max_age() {
        let line = r#"{"class":"TPV","mode":2,"time":"2026-08-08T15:32:33.000Z","lat":45.5,"lon":-73.5}"#;
        // Watch started one minute after the fix was captured.
        let started = 1_786_203_153_000 + 60_000;
        assert!(parse_tpv(line, &options(), started).is_none());
        // The same fix is fine when the watch predates it.
        assert!(parse_tpv(line, &options(), 1_786_203_000_000).is_some());
    }

    #[test]
    fn parse_tpv_accuracy_falls_back_to_epx_epy() {
        let line = r#"{"class":"TPV","mode":2,"lat":45.5,"lon":-73.5,"epx":3.0,"epy":7.5}"#;
        let sample = parse_tpv(line, &options(), 0).unwrap();
        assert!((sample.accuracy - 7.5).abs() < 1e-9);
    }
}

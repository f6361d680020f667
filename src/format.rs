//! Display formatting for tracker output.
//!
//! These functions are the rendering contract: every surface (HTTP view,
//! WebSocket, embedded page) shows exactly these strings.

use chrono::{Local, TimeZone};

/// Conversion factor from m/s to km/h.
const MS_TO_KMH: f64 = 3.6;

/// A coordinate fixed to six decimal places with a trailing degree mark.
#[must_use]
pub fn coordinate(degrees: f64) -> String {
    format!("{degrees:.6}°")
}

/// Speed converted to km/h at one decimal place.
///
/// Absent and exactly-zero speeds both render as `N/A`: the zero case is a
/// long-standing quirk of this display, kept for compatibility.
#[must_use]
pub fn speed(meters_per_second: Option<f64>) -> String {
    match meters_per_second {
        Some(v) if v != 0.0 => format!("{:.1} km/h", v * MS_TO_KMH),
        _ => "N/A".to_string(),
    }
}

/// Heading at one decimal place with a degree mark; zero renders as `N/A`
/// like [`speed`].
#[must_use]
pub fn heading(degrees: Option<f64>) -> String {
    match degrees {
        Some(v) if v != 0.0 => format!("{v:.1}°"),
        _ => "N/A".to_string(),
    }
}

/// Accuracy at one decimal place with a meters suffix.
#[must_use]
pub fn accuracy(meters: f64) -> String {
    format!("{meters:.1} meters")
}

/// Capture time as local 24-hour `HH:MM:SS`.
#[must_use]
pub fn clock(timestamp_ms: u64) -> String {
    let ms = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => "??:??:??".to_string(),
    }
}

/// The clipboard payload: raw, unrounded coordinates.
#[must_use]
pub fn copy_payload(latitude: f64, longitude: f64) -> String {
    format!("{latitude}, {longitude}")
}

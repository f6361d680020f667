//! Position source abstraction.
//!
//! A source is the external collaborator that senses location. It exposes a
//! capability check, a start-continuous-watch operation returning a handle
//! plus an ordered event stream, and a stop-watch operation taking the
//! handle. Two implementations ship: [`gpsd::GpsdSource`] for a live gpsd
//! daemon and [`constant::ConstantSource`] for demos and tests.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::tracker::PositionSample;

pub mod constant;
pub mod gpsd;

/// Fixed message stored when the host has no position-sensing capability.
pub const NOT_SUPPORTED_MSG: &str = "position sensing is not supported on this host";

/// Opaque handle to a started watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(Uuid);

impl WatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Options for a continuous watch.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Favor precision over power/latency.
    pub high_accuracy: bool,
    /// Deadline for the first fix, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum age of a cached fix the watch will accept. 0 admits only
    /// fixes captured at or after watch start.
    pub maximum_age_ms: u64,
}

impl Default for WatchOptions {
    /// The tracker's startup protocol: high accuracy, 5 s first-fix
    /// deadline, no cached fixes.
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 5000,
            maximum_age_ms: 0,
        }
    }
}

/// Why a watch failed. Terminal for the subscription; never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    PermissionDenied,
    Unavailable(String),
    Timeout,
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "position permission denied"),
            Self::Unavailable(detail) => write!(f, "position unavailable: {detail}"),
            Self::Timeout => write!(f, "timed out waiting for a position"),
        }
    }
}

impl std::error::Error for WatchError {}

/// One delivery on a watch stream.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Sample(PositionSample),
    /// Terminal failure; no further events follow.
    Failed(WatchError),
}

/// A started watch: the handle plus its event stream. Events arrive
/// strictly in delivery order (the channel is FIFO).
pub struct Watch {
    pub id: WatchId,
    pub events: mpsc::Receiver<WatchEvent>,
}

/// A continuous position provider.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Whether this host can sense position at all.
    fn supported(&self) -> bool;

    /// Start a continuous watch.
    async fn start_watch(&self, options: WatchOptions) -> Result<Watch, WatchError>;

    /// Stop a previously started watch. Idempotent for unknown handles.
    async fn stop_watch(&self, id: WatchId);
}

/// Source used when no `[source]` is configured: capability absent.
pub struct UnsupportedSource;

#[async_trait]
impl PositionSource for UnsupportedSource {
    fn supported(&self) -> bool {
        false
    }

    async fn start_watch(&self, _options: WatchOptions) -> Result<Watch, WatchError> {
        Err(WatchError::Unavailable(NOT_SUPPORTED_MSG.to_string()))
    }

    async fn stop_watch(&self, _id: WatchId) {}
}

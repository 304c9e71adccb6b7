//! Refresh duration telemetry
//!
//! Workers report one observation per job, for the initial attempt only.
//! Retry attempts are never timed.

use std::time::Duration;

use opentelemetry::metrics::{Histogram, Meter};
use opentelemetry::KeyValue;
use parking_lot::Mutex;

/// Histogram name for background refresh durations
pub const BACKGROUND_FEED_REFRESH_DURATION: &str = "feedrun.background_feed_refresh.duration";

/// Outcome label attached to an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshStatus {
    /// The refresh succeeded
    Success,
    /// The refresh returned an error
    Error,
}

impl RefreshStatus {
    /// Label value used by metrics backends
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for refresh duration observations
pub trait MetricsCollector: Send + Sync {
    /// Record how long a first refresh attempt took
    fn observe_refresh(&self, status: RefreshStatus, elapsed: Duration);
}

/// OpenTelemetry histogram collector
///
/// Records seconds into [`BACKGROUND_FEED_REFRESH_DURATION`] with a `status`
/// attribute. Whatever meter provider the host process installs receives the
/// data; with none installed, recording is a no-op.
pub struct OtelRefreshMetrics {
    duration: Histogram<f64>,
}

impl OtelRefreshMetrics {
    /// Create a collector from the global meter provider
    pub fn new() -> Self {
        Self::with_meter(&opentelemetry::global::meter("feedrun"))
    }

    /// Create a collector from an explicit meter
    pub fn with_meter(meter: &Meter) -> Self {
        let duration = meter
            .f64_histogram(BACKGROUND_FEED_REFRESH_DURATION)
            .with_description("Processing time to refresh feeds from the background workers")
            .with_unit("s")
            .build();
        Self { duration }
    }
}

impl Default for OtelRefreshMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for OtelRefreshMetrics {
    fn observe_refresh(&self, status: RefreshStatus, elapsed: Duration) {
        self.duration.record(
            elapsed.as_secs_f64(),
            &[KeyValue::new("status", status.as_str())],
        );
    }
}

/// A recorded observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub status: RefreshStatus,
    pub elapsed: Duration,
}

/// Collector that keeps every observation in memory
///
/// Primarily for tests.
#[derive(Default)]
pub struct InMemoryMetrics {
    observations: Mutex<Vec<Observation>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all observations so far, in record order
    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }

    /// Number of observations with the given status
    pub fn count(&self, status: RefreshStatus) -> usize {
        self.observations
            .lock()
            .iter()
            .filter(|o| o.status == status)
            .count()
    }
}

impl MetricsCollector for InMemoryMetrics {
    fn observe_refresh(&self, status: RefreshStatus, elapsed: Duration) {
        self.observations.lock().push(Observation { status, elapsed });
    }
}

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

/// A point-in-time snapshot of everything useful for debugging or
/// dashboards: queue occupancy, cumulative counters, and a per-key/per-
/// segment summary. Cheap to build on demand; nothing here is kept
/// continuously up to date on the side.
#[derive(Debug, Clone, Serialize)]
pub struct SegmenterState {
    pub holding_queue_bytes: u64,
    pub holding_queue_count: u64,
    pub holding_queue_limit: u64,
    pub peak_size_bytes: u64,
    pub bytes_forwarded: u64,
    pub count_forwarded: u64,
    pub bytes_dropped: u64,
    pub count_dropped: u64,
    pub next_refresh_in: Option<Duration>,
    pub lookup_latency_ewma: Option<Duration>,
    /// When the last error occurred, as a duration since the clock's epoch
    /// (the same representation `Timestamp` is built on); `None` if no
    /// lookup has ever failed.
    pub last_error_time: Option<Duration>,
    pub last_error_message: Option<String>,
    pub segments: Vec<SegmentSummary>,
    pub key_infos: Vec<KeyInfoSummary>,
    /// Routing keys with a manifest lookup currently in flight.
    pub in_flight_lookups: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub segment_key: String,
    pub bytes_incoming: u64,
    pub count_incoming: u64,
    pub scheduled_for_batching: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyInfoSummary {
    pub key: String,
    pub bound_segment: Option<String>,
    pub looking_up: bool,
    pub rejection_active: bool,
    pub last_error_message: Option<String>,
}

pub(crate) fn lossy_key(key: &Bytes) -> String {
    String::from_utf8_lossy(key).into_owned()
}

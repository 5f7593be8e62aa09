use std::{
    sync::LazyLock,
    time::Duration,
};

use prometheus::{
    Histogram,
    IntCounter,
    IntCounterVec,
    IntGauge,
};

use crate::errors::ManifestError;

static TRANSACTIONS_ACCEPTED_BYTES: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_transactions_accepted_bytes_total",
        "Total bytes of transactions accepted into a Segment or the Holding Queue.",
    )
});
static TRANSACTIONS_ACCEPTED_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_transactions_accepted_total",
        "Total number of transactions accepted into a Segment or the Holding Queue.",
    )
});
static TRANSACTIONS_DROPPED_BYTES: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_transactions_dropped_bytes_total",
        "Total bytes of transactions dropped, by overload or failed lookup.",
    )
});
static TRANSACTIONS_DROPPED_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_transactions_dropped_total",
        "Total number of transactions dropped, by overload or failed lookup.",
    )
});
static TRANSACTIONS_FORWARDED_BYTES: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_transactions_forwarded_bytes_total",
        "Total bytes of transactions delivered into a Segment's incoming list.",
    )
});
static TRANSACTIONS_FORWARDED_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_transactions_forwarded_total",
        "Total number of transactions delivered into a Segment's incoming list.",
    )
});
static HOLDING_QUEUE_BYTES: LazyLock<IntGauge> = LazyLock::new(|| {
    ::metrics::register_gauge(
        "segmenter_holding_queue_bytes",
        "Current bytes queued in the Holding Queue.",
    )
});
static HOLDING_QUEUE_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    ::metrics::register_gauge(
        "segmenter_holding_queue_count",
        "Current number of transactions queued in the Holding Queue.",
    )
});
static LOOKUPS_INITIATED: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter("segmenter_lookups_initiated_total", "Manifest lookups started.")
});
static LOOKUPS_SUCCEEDED: LazyLock<IntCounter> = LazyLock::new(|| {
    ::metrics::register_counter(
        "segmenter_lookups_succeeded_total",
        "Manifest lookups that resolved successfully.",
    )
});
static LOOKUPS_FAILED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    ::metrics::register_counter_vec(
        "segmenter_lookups_failed_total",
        "Manifest lookups that did not resolve, by failure kind.",
        &["kind"],
    )
});
static LOOKUP_LATENCY_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    ::metrics::register_histogram(
        "segmenter_lookup_latency_seconds",
        "Time from initiating a manifest lookup to its completion.",
    )
});

fn manifest_error_kind(error: &ManifestError) -> &'static str {
    match error {
        ManifestError::Transport(_) => "transport",
        ManifestError::InvalidJson(_) => "invalid_json",
        ManifestError::InvalidSchema(_) => "invalid_schema",
        ManifestError::Rejected { .. } => "rejected",
        ManifestError::HttpStatus(_) => "http_status",
    }
}

/// The engine's prometheus metrics. A single instance is shared (via `Arc`)
/// between the engine and its [`crate::manifest_client::ManifestClient`].
/// Registration happens once per process via the statics above; this
/// struct just gives callers methods instead of bare globals to poke.
pub struct SegmenterMetrics {
    registered: bool,
}

impl SegmenterMetrics {
    pub fn new() -> Self {
        LazyLock::force(&TRANSACTIONS_ACCEPTED_BYTES);
        LazyLock::force(&TRANSACTIONS_ACCEPTED_COUNT);
        LazyLock::force(&TRANSACTIONS_DROPPED_BYTES);
        LazyLock::force(&TRANSACTIONS_DROPPED_COUNT);
        LazyLock::force(&TRANSACTIONS_FORWARDED_BYTES);
        LazyLock::force(&TRANSACTIONS_FORWARDED_COUNT);
        LazyLock::force(&HOLDING_QUEUE_BYTES);
        LazyLock::force(&HOLDING_QUEUE_COUNT);
        LazyLock::force(&LOOKUPS_INITIATED);
        LazyLock::force(&LOOKUPS_SUCCEEDED);
        LazyLock::force(&LOOKUPS_FAILED);
        LazyLock::force(&LOOKUP_LATENCY_SECONDS);
        Self { registered: true }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn new_for_test() -> Self {
        Self::new()
    }

    pub fn record_accepted(&self, bytes: u64, count: u64) {
        TRANSACTIONS_ACCEPTED_BYTES.inc_by(bytes);
        TRANSACTIONS_ACCEPTED_COUNT.inc_by(count);
    }

    pub fn record_dropped(&self, bytes: u64, count: u64) {
        TRANSACTIONS_DROPPED_BYTES.inc_by(bytes);
        TRANSACTIONS_DROPPED_COUNT.inc_by(count);
    }

    pub fn record_forwarded(&self, bytes: u64, count: u64) {
        TRANSACTIONS_FORWARDED_BYTES.inc_by(bytes);
        TRANSACTIONS_FORWARDED_COUNT.inc_by(count);
    }

    pub fn set_holding_queue_gauges(&self, bytes: u64, count: u64) {
        HOLDING_QUEUE_BYTES.set(bytes as i64);
        HOLDING_QUEUE_COUNT.set(count as i64);
    }

    pub fn record_lookup_initiated(&self) {
        LOOKUPS_INITIATED.inc();
    }

    pub fn record_lookup_succeeded(&self) {
        LOOKUPS_SUCCEEDED.inc();
    }

    pub fn record_lookup_failed(&self, error: &ManifestError) {
        LOOKUPS_FAILED.with_label_values(&[manifest_error_kind(error)]).inc();
    }

    pub fn record_lookup_latency(&self, elapsed: Duration) {
        LOOKUP_LATENCY_SECONDS.observe(elapsed.as_secs_f64());
    }
}

impl Default for SegmenterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SegmenterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmenterMetrics")
            .field("registered", &self.registered)
            .finish()
    }
}

//! A thin wrapper around `prometheus` providing a process-wide registry and a
//! `StatusTimer` that defaults to "error" unless explicitly finished as a
//! success — so a panic or early return inside a timed block is never
//! silently recorded as a success.

mod timer;

use std::sync::LazyLock;

use prometheus::{
    Encoder,
    IntCounter,
    IntCounterVec,
    IntGauge,
    Opts,
    Registry,
    TextEncoder,
};

pub use crate::timer::{
    StatusTimer,
    Timer,
};

/// The process-wide registry every metric in this workspace registers into.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Renders the current state of [`REGISTRY`] in the Prometheus text exposition
/// format, for a `/metrics` scrape endpoint.
pub fn gather() -> anyhow::Result<String> {
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Registers and returns a counter. Panics on a duplicate name — that's a
/// programmer error caught the first time the metric is touched, not
/// something to handle at runtime.
pub fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("invalid metric name/help");
    REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("failed to register counter {name}: {e}"));
    counter
}

pub fn register_counter_vec(name: &str, help: &str, label_names: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), label_names)
        .expect("invalid metric name/help/labels");
    REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("failed to register counter vec {name}: {e}"));
    counter
}

pub fn register_gauge(name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("invalid metric name/help");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .unwrap_or_else(|e| panic!("failed to register gauge {name}: {e}"));
    gauge
}

pub fn register_histogram(name: &str, help: &str) -> prometheus::Histogram {
    let histogram = prometheus::Histogram::with_opts(prometheus::HistogramOpts::new(name, help))
        .expect("invalid metric name/help");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap_or_else(|e| panic!("failed to register histogram {name}: {e}"));
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_renders_registered_metrics() {
        let counter = register_counter(
            "metrics_test_gather_renders_registered_metrics_total",
            "test counter",
        );
        counter.inc();
        let rendered = gather().unwrap();
        assert!(rendered.contains("metrics_test_gather_renders_registered_metrics_total"));
    }
}

use std::sync::LazyLock;

use prometheus::HistogramVec;

static FETCH_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let histogram = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_client_fetch_duration_seconds",
            "Duration of outgoing HTTP fetches, labeled by status (success/error)",
        ),
        &["status"],
    )
    .expect("invalid histogram spec");
    ::metrics::REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("failed to register http_client_fetch_duration_seconds");
    histogram
});

pub(crate) fn fetch_timer() -> ::metrics::StatusTimer<'static> {
    ::metrics::StatusTimer::new(&FETCH_DURATION_SECONDS)
}

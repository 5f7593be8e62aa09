//! Structured logging setup, shared by every binary built on this stack.

use tracing_subscriber::{
    fmt::format::FmtSpan,
    EnvFilter,
};

/// Call once from `main`. Honors `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .try_init();
}

/// Call from test modules. Safe to call more than once (later calls are
/// no-ops) since many test binaries share a process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .compact()
        .try_init();
}

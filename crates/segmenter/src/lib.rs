//! Groups telemetry transactions carrying opaque routing keys into Segments
//! by the set of gateway endpoints their key resolves to, so a downstream
//! batcher can hand each Segment's transactions to the right endpoints
//! without re-deriving that mapping itself.
//!
//! [`engine::SegmenterEngine`] is the whole system: it owns the key
//! directory, the segment registry, and the holding queue, and drives
//! lookups through a [`manifest_client::ManifestClient`] against whatever
//! [`http_client::FetchClient`] it's given. [`engine::SegmenterHandle`] is
//! the cloneable, `Send` client other tasks use to talk to a running engine.

pub mod batcher;
pub mod config;
pub mod engine;
pub mod errors;
pub mod holding_queue;
pub mod key_directory;
pub mod key_info;
pub mod manifest;
pub mod manifest_client;
pub mod metrics;
pub mod observability;
pub mod refresh_scheduler;
pub mod segment;
pub mod segment_registry;
pub mod transaction;

pub use batcher::Batcher;
pub use config::SegmenterConfig;
pub use engine::{
    EngineCommand,
    SegmenterEngine,
    SegmenterHandle,
};
pub use errors::ManifestError;
pub use observability::SegmenterState;
pub use transaction::Transaction;

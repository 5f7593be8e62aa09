//! Small, dependency-light utilities shared across this workspace's crates:
//! a monotonic clock abstraction, environment/config helpers, logging
//! setup, and a cooperative shutdown signal.

pub mod clock;
pub mod env;
pub mod logging;
pub mod shutdown;

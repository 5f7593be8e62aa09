use std::{
    cell::RefCell,
    rc::Rc,
    time::Duration,
};

use bytes::Bytes;
use common::clock::Timestamp;

use crate::segment::Segment;

/// Defaults lifted from the recheck timeouts of the system this crate's
/// lookup cadence is modeled on: a healthy key is rechecked every five
/// minutes, a key with an outstanding error every minute.
pub const DEFAULT_REFRESH_TIMEOUT_HEALTHY: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REFRESH_TIMEOUT_ERRORS: Duration = Duration::from_secs(60);

/// Everything known about one routing key: whether it currently resolves to
/// a Segment, the cadence at which it should be re-resolved, and enough
/// history about its most recent lookup to drive both scheduling and state
/// inspection.
#[derive(Debug)]
pub struct KeyInfo {
    key: Bytes,
    pub segment: Option<Rc<RefCell<Segment>>>,
    pub looking_up: bool,
    pub rejection_active: bool,
    pub last_lookup_success_time: Timestamp,
    pub last_lookup_error_time: Timestamp,
    pub last_rejection_time: Timestamp,
    pub last_error_message: Option<String>,
    pub refresh_timeout_healthy: Duration,
    pub refresh_timeout_errors: Duration,
    pub lookup_latency_ewma: Option<Duration>,
}

impl KeyInfo {
    pub fn new(key: Bytes) -> Self {
        Self {
            key,
            segment: None,
            looking_up: false,
            rejection_active: false,
            last_lookup_success_time: Timestamp::ZERO,
            last_lookup_error_time: Timestamp::ZERO,
            last_rejection_time: Timestamp::ZERO,
            last_error_message: None,
            refresh_timeout_healthy: DEFAULT_REFRESH_TIMEOUT_HEALTHY,
            refresh_timeout_errors: DEFAULT_REFRESH_TIMEOUT_ERRORS,
            lookup_latency_ewma: None,
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// The deadline this key's refresh should be scheduled for, per the
    /// coalesced-timer law: last success plus the healthy cadence while
    /// the most recent attempt succeeded, or last failure plus the error
    /// cadence otherwise. A key with an in-flight lookup has no deadline of
    /// its own.
    pub fn refresh_deadline(&self) -> Option<Timestamp> {
        if self.looking_up {
            return None;
        }
        let deadline = if self.rejection_active {
            self.last_rejection_time.checked_add(self.refresh_timeout_errors)
        } else {
            self.last_lookup_success_time.checked_add(self.refresh_timeout_healthy)
        };
        Some(deadline.unwrap_or(Timestamp::ZERO))
    }
}

use std::time::Duration;

use common::clock::Timestamp;

use crate::key_directory::KeyDirectory;

/// Refresh deadlines are always rounded up to a multiple of this, so a
/// burst of keys whose lookups complete seconds apart still coalesces onto
/// one timer instead of firing once per key.
pub const COALESCE_UNIT: Duration = Duration::from_secs(5);

/// Computes when the next refresh sweep should fire: the earliest deadline
/// across every key not currently mid-lookup, rounded up to [`COALESCE_UNIT`].
/// Returns `None` when no key has a deadline to wait for — either the
/// directory is empty or every key is currently looking up — in which case
/// the caller should leave its timer disarmed rather than poll.
pub fn next_refresh_deadline(directory: &KeyDirectory) -> Option<Timestamp> {
    let earliest = directory
        .iter()
        .filter_map(|key_info| key_info.borrow().refresh_deadline())
        .min()?;
    Some(earliest.round_up_to_multiple(COALESCE_UNIT))
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        rc::Rc,
    };

    use bytes::Bytes;

    use super::*;
    use crate::key_info::KeyInfo;

    #[test]
    fn empty_directory_has_no_deadline() {
        let directory = KeyDirectory::new();
        assert!(next_refresh_deadline(&directory).is_none());
    }

    #[test]
    fn keys_currently_looking_up_are_excluded() {
        let mut directory = KeyDirectory::new();
        directory.find_or_create(&Bytes::from_static(b"a"), |key_info| {
            key_info.borrow_mut().looking_up = true;
            true
        });
        assert!(next_refresh_deadline(&directory).is_none());
    }

    #[test]
    fn deadline_is_the_minimum_rounded_up_to_five_seconds() {
        let mut directory = KeyDirectory::new();
        directory.find_or_create(&Bytes::from_static(b"a"), |key_info| {
            key_info.borrow_mut().last_lookup_success_time =
                Timestamp::ZERO.checked_add(Duration::from_secs(1)).unwrap();
            key_info.borrow_mut().refresh_timeout_healthy = Duration::from_secs(300);
            true
        });
        directory.find_or_create(&Bytes::from_static(b"b"), |key_info| {
            key_info.borrow_mut().last_lookup_success_time =
                Timestamp::ZERO.checked_add(Duration::from_secs(2)).unwrap();
            key_info.borrow_mut().refresh_timeout_healthy = Duration::from_secs(1);
            true
        });
        // Key "b" resolves at t=3 (earliest), rounded up to the next
        // multiple of five seconds: 5.
        let deadline = next_refresh_deadline(&directory).unwrap();
        assert_eq!(
            deadline,
            Timestamp::ZERO.checked_add(Duration::from_secs(5)).unwrap()
        );
    }
}

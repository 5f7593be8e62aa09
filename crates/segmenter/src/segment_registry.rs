use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

use bytes::Bytes;

use crate::segment::Segment;

/// Maps a canonical endpoint-set fingerprint to the single Segment
/// currently backing it. Keyed by fingerprint because the set of distinct
/// endpoint combinations in play at once is expected to be small, so a hash
/// map lookup costs nothing that matters.
///
/// Segments are never proactively evicted: once created, a Segment is kept
/// for the life of the process even after every KeyInfo has rebound away
/// from it. At the key cardinalities this is designed for, the memory held
/// by an orphaned Segment's (empty) incoming list is negligible next to the
/// cost of tracking liveness precisely.
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    segments: HashMap<Bytes, Rc<RefCell<Segment>>>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, fingerprint: &Bytes) -> Option<Rc<RefCell<Segment>>> {
        self.segments.get(fingerprint).cloned()
    }

    pub fn find_or_create(&mut self, fingerprint: &Bytes) -> Rc<RefCell<Segment>> {
        self.segments
            .entry(fingerprint.clone())
            .or_insert_with(|| Rc::new(RefCell::new(Segment::new(fingerprint.clone()))))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<RefCell<Segment>>> {
        self.segments.values()
    }
}

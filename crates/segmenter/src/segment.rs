use std::collections::VecDeque;

use bytes::Bytes;

use crate::transaction::Transaction;

/// A group of transactions that share a resolved set of gateway endpoints.
/// Owned jointly by every [`crate::key_info::KeyInfo`] currently bound to
/// it; the engine hands a Segment to the Batcher once its incoming list is
/// non-empty and no hand-off for it is already outstanding.
#[derive(Debug)]
pub struct Segment {
    segment_key: Bytes,
    incoming_transactions: VecDeque<Transaction>,
    bytes_incoming: u64,
    count_incoming: u64,
    scheduled_for_batching: bool,
}

impl Segment {
    pub fn new(segment_key: Bytes) -> Self {
        Self {
            segment_key,
            incoming_transactions: VecDeque::new(),
            bytes_incoming: 0,
            count_incoming: 0,
            scheduled_for_batching: false,
        }
    }

    pub fn segment_key(&self) -> &Bytes {
        &self.segment_key
    }

    pub fn push_incoming(&mut self, transaction: Transaction) {
        self.bytes_incoming += transaction.body_len();
        self.count_incoming += 1;
        self.incoming_transactions.push_back(transaction);
    }

    pub fn bytes_incoming(&self) -> u64 {
        self.bytes_incoming
    }

    pub fn count_incoming(&self) -> u64 {
        self.count_incoming
    }

    pub fn incoming_is_empty(&self) -> bool {
        self.incoming_transactions.is_empty()
    }

    pub fn scheduled_for_batching(&self) -> bool {
        self.scheduled_for_batching
    }

    pub fn set_scheduled_for_batching(&mut self, scheduled: bool) {
        self.scheduled_for_batching = scheduled;
    }

    /// Moves the entire incoming list out, resetting the byte/count
    /// bookkeeping. Called by a Batcher adapter as it takes ownership of a
    /// Segment's pending transactions.
    pub fn take_incoming(&mut self) -> VecDeque<Transaction> {
        self.bytes_incoming = 0;
        self.count_incoming = 0;
        std::mem::take(&mut self.incoming_transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_incoming_updates_counters() {
        let mut segment = Segment::new(Bytes::from_static(b"fingerprint"));
        segment.push_incoming(Transaction::new(&b"k"[..], &b"1234"[..]));
        segment.push_incoming(Transaction::new(&b"k"[..], &b"12"[..]));
        assert_eq!(segment.bytes_incoming(), 6);
        assert_eq!(segment.count_incoming(), 2);
        assert!(!segment.incoming_is_empty());
    }

    #[test]
    fn take_incoming_drains_and_resets() {
        let mut segment = Segment::new(Bytes::from_static(b"fingerprint"));
        segment.push_incoming(Transaction::new(&b"k"[..], &b"1234"[..]));
        let taken = segment.take_incoming();
        assert_eq!(taken.len(), 1);
        assert!(segment.incoming_is_empty());
        assert_eq!(segment.bytes_incoming(), 0);
        assert_eq!(segment.count_incoming(), 0);
    }
}

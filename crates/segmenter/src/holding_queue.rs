use std::collections::VecDeque;

use bytes::Bytes;

use crate::transaction::Transaction;

/// FIFO of transactions waiting on an in-flight manifest lookup for their
/// key. Transactions leave in the order they arrived, either drained to a
/// Segment once their key resolves or dropped if the lookup fails.
#[derive(Debug)]
pub struct HoldingQueue {
    queue: VecDeque<Transaction>,
    bytes_queued: u64,
    limit: u64,
}

impl HoldingQueue {
    pub fn new(limit: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            bytes_queued: 0,
            limit,
        }
    }

    pub fn push_back(&mut self, transaction: Transaction) {
        self.bytes_queued += transaction.body_len();
        self.queue.push_back(transaction);
    }

    pub fn bytes_queued(&self) -> u64 {
        self.bytes_queued
    }

    pub fn count_queued(&self) -> usize {
        self.queue.len()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn is_over_limit(&self) -> bool {
        self.bytes_queued > self.limit
    }

    /// Removes and returns every transaction whose routing key matches
    /// `key`, preserving the relative order of both the removed and the
    /// remaining transactions.
    pub fn drain_matching(&mut self, key: &Bytes) -> VecDeque<Transaction> {
        let mut matched = VecDeque::new();
        let mut rest = VecDeque::with_capacity(self.queue.len());
        for transaction in self.queue.drain(..) {
            if transaction.key() == key {
                self.bytes_queued -= transaction.body_len();
                matched.push_back(transaction);
            } else {
                rest.push_back(transaction);
            }
        }
        self.queue = rest;
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_bytes_and_count() {
        let mut queue = HoldingQueue::new(100);
        queue.push_back(Transaction::new(&b"a"[..], &b"1234"[..]));
        queue.push_back(Transaction::new(&b"b"[..], &b"12"[..]));
        assert_eq!(queue.count_queued(), 2);
        assert_eq!(queue.bytes_queued(), 6);
        assert!(!queue.is_over_limit());
    }

    #[test]
    fn over_limit_when_bytes_exceed_limit() {
        let mut queue = HoldingQueue::new(4);
        queue.push_back(Transaction::new(&b"a"[..], &b"12345"[..]));
        assert!(queue.is_over_limit());
    }

    #[test]
    fn drain_matching_preserves_order_of_both_partitions() {
        let mut queue = HoldingQueue::new(1000);
        queue.push_back(Transaction::new(&b"a"[..], &b"1"[..]));
        queue.push_back(Transaction::new(&b"b"[..], &b"22"[..]));
        queue.push_back(Transaction::new(&b"a"[..], &b"333"[..]));
        queue.push_back(Transaction::new(&b"c"[..], &b"4444"[..]));
        queue.push_back(Transaction::new(&b"a"[..], &b"55555"[..]));

        let matched = queue.drain_matching(&Bytes::from_static(b"a"));
        let matched_bodies: Vec<_> = matched.iter().map(|t| t.body().clone()).collect();
        assert_eq!(matched_bodies, vec![
            Bytes::from_static(b"1"),
            Bytes::from_static(b"333"),
            Bytes::from_static(b"55555"),
        ]);

        assert_eq!(queue.count_queued(), 2);
        assert_eq!(queue.bytes_queued(), 2 + 4);
    }
}

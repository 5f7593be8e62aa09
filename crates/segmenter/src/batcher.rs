use std::{
    cell::RefCell,
    rc::Rc,
};

use async_trait::async_trait;

use crate::segment::Segment;

/// The external collaborator that takes ownership of a Segment's pending
/// transactions and forms them into outgoing batches. Out of scope for
/// this crate beyond this boundary: an implementation is expected to drain
/// each Segment's incoming list (via [`Segment::take_incoming`]) into its
/// own queues before returning, since the engine asserts the list is empty
/// again once the call completes.
///
/// `?Send` because a Segment is `Rc`-owned and this trait is only ever
/// called from the single task that owns the engine's state.
#[async_trait(?Send)]
pub trait Batcher {
    async fn schedule(&self, segments: &[Rc<RefCell<Segment>>]);
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::{
        cell::RefCell as StdRefCell,
        collections::VecDeque,
    };

    use bytes::Bytes;

    use super::*;
    use crate::transaction::Transaction;

    /// Records each `schedule` call: which segment fingerprints were
    /// forwarded, and the transactions drained from each. Drains every
    /// segment it's given, matching what a real Batcher adapter is
    /// required to do.
    #[derive(Default)]
    pub struct RecordingBatcher {
        calls: StdRefCell<Vec<Vec<(Bytes, VecDeque<Transaction>)>>>,
    }

    impl RecordingBatcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        pub fn calls(&self) -> Vec<Vec<(Bytes, VecDeque<Transaction>)>> {
            self.calls.borrow().clone()
        }
    }

    #[async_trait(?Send)]
    impl Batcher for RecordingBatcher {
        async fn schedule(&self, segments: &[Rc<RefCell<Segment>>]) {
            let mut call = Vec::with_capacity(segments.len());
            for segment in segments {
                let mut segment = segment.borrow_mut();
                let fingerprint = segment.segment_key().clone();
                let drained = segment.take_incoming();
                call.push((fingerprint, drained));
            }
            self.calls.borrow_mut().push(call);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{
        testing::RecordingBatcher,
        *,
    };
    use crate::transaction::Transaction;

    #[tokio::test]
    async fn recording_batcher_drains_every_segment_it_receives() {
        let batcher = RecordingBatcher::new();
        let segment = Rc::new(RefCell::new(Segment::new(Bytes::from_static(b"fp"))));
        segment.borrow_mut().push_incoming(Transaction::new(&b"k"[..], &b"body"[..]));

        batcher.schedule(&[segment.clone()]).await;

        assert_eq!(batcher.call_count(), 1);
        assert!(segment.borrow().incoming_is_empty());
        let calls = batcher.calls();
        assert_eq!(calls[0][0].1.len(), 1);
    }
}

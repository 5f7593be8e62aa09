use bytes::Bytes;

/// A single telemetry transaction, opaque to this crate beyond its routing
/// key and body. Produced by the ingest frontend (out of scope here) and
/// moved by value into the Segmenter; ownership transfers monotonically
/// from there into either a Segment's incoming list or the Holding Queue,
/// and finally to the Batcher — or it is dropped under overload.
#[derive(Debug, Clone)]
pub struct Transaction {
    key: Bytes,
    body: Bytes,
}

impl Transaction {
    pub fn new(key: impl Into<Bytes>, body: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_len(&self) -> u64 {
        self.body.len() as u64
    }
}

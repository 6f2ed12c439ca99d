//! BlobRecord - one ingested payload

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// An opaque binary payload accepted by the ingestion endpoint.
///
/// The size is always derived from the payload, so `size() == payload().len()`
/// holds by construction. The size limit is enforced by the endpoint before a
/// record is ever built for fan-out.
#[derive(Debug, Clone)]
pub struct BlobRecord {
    /// Process-unique, monotonically increasing id (assigned by the endpoint)
    sequence: u64,
    /// Arrival time
    received_at: DateTime<Utc>,
    /// Blob contents
    payload: Bytes,
}

impl BlobRecord {
    /// Create a new record stamped with the current time
    pub fn new(sequence: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            received_at: Utc::now(),
            payload: payload.into(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Borrow the payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

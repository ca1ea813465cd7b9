use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One compressed frame as it arrived from the camera socket.
/// Consumed by the codec and discarded after decode.
pub struct RawFrame {
    bytes: Vec<u8>,
    received_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            received_at: Utc::now(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// A re-encoded, annotation-burned frame ready for fan-out, plus the
/// detection count that produced it. Shared read-only behind an `Arc`;
/// the state store keeps only the most recent one.
pub struct AnnotatedFrame {
    pub jpeg: Vec<u8>,
    pub detections: usize,
    pub produced_at: DateTime<Utc>,
}

impl AnnotatedFrame {
    pub fn new(jpeg: Vec<u8>, detections: usize) -> Arc<Self> {
        Arc::new(Self {
            jpeg,
            detections,
            produced_at: Utc::now(),
        })
    }
}

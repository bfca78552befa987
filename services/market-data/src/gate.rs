//! Readiness gate and time-bucket deduplication
//!
//! High-frequency streams publish at most once per bucket (100ms by
//! default) and only after the snapshot became meaningful. Readiness is
//! one-way unless [`PublishGate::reset`] is called explicitly.

/// Default bucket width in milliseconds
pub const DEFAULT_BUCKET_MS: i64 = 100;

#[derive(Debug, Clone)]
pub struct PublishGate {
    bucket_ms: i64,
    ready: bool,
    last_bucket: i64,
}

impl PublishGate {
    pub fn new(bucket_ms: i64) -> Self {
        Self {
            bucket_ms: bucket_ms.max(1),
            ready: false,
            last_bucket: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Bucket of the last publish.
    pub fn last_bucket(&self) -> i64 {
        self.last_bucket
    }

    /// Admit a publish at `now_ms` if it falls in a new bucket.
    pub fn admit(&mut self, now_ms: i64) -> bool {
        let bucket = now_ms / self.bucket_ms;
        if bucket == self.last_bucket {
            return false;
        }
        self.last_bucket = bucket;
        true
    }

    /// Forget readiness and bucket state.
    pub fn reset(&mut self) {
        self.ready = false;
        self.last_bucket = 0;
    }
}

impl Default for PublishGate {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_MS)
    }
}

//! Outbound throttling.
//!
//! The client asks the throttle before every call, keyed by
//! `"{METHOD}:{collection}"`. A refused read behaves like a failed read; a
//! refused write fails with [`SyncError::Throttled`](crate::SyncError::Throttled).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

/// How urgent a call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background bulk work.
    Low,
    /// Reads.
    Normal,
    /// Direct writes.
    High,
}

/// Decides whether an outbound call may proceed now.
pub trait Throttle: Send + Sync {
    /// Returns true and consumes capacity if the call is admitted.
    fn try_acquire(&self, key: &str, priority: Priority) -> bool;
}

/// Admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

impl Throttle for NoThrottle {
    fn try_acquire(&self, _key: &str, _priority: Priority) -> bool {
        true
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
            self.last_refill = now;
        }
    }
}

/// Per-key token buckets.
///
/// A slice of every bucket is held back for [`Priority::High`]; low priority
/// calls stop at twice that reserve.
#[derive(Debug)]
pub struct TokenBucketThrottle {
    capacity: f64,
    refill_rate: f64,
    reserved: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl TokenBucketThrottle {
    /// Creates a throttle with `capacity` burst tokens refilled at
    /// `refill_rate` tokens per second, 20% reserved for high priority.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_rate: refill_rate.max(0.0),
            reserved: capacity * 0.2,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the fraction of capacity reserved for high priority calls.
    pub fn with_reserved_fraction(mut self, fraction: f64) -> Self {
        self.reserved = self.capacity * fraction.clamp(0.0, 0.5);
        self
    }

    fn floor(&self, priority: Priority) -> f64 {
        match priority {
            Priority::High => 0.0,
            Priority::Normal => self.reserved,
            Priority::Low => self.reserved * 2.0,
        }
    }

    /// Tokens currently left for `key`.
    pub fn available(&self, key: &str) -> f64 {
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(key) {
            Some(bucket) => {
                bucket.refill(self.capacity, self.refill_rate);
                bucket.tokens
            }
            None => self.capacity,
        }
    }
}

impl Throttle for TokenBucketThrottle {
    fn try_acquire(&self, key: &str, priority: Priority) -> bool {
        let floor = self.floor(priority);
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity));
        bucket.refill(self.capacity, self.refill_rate);

        if bucket.tokens - 1.0 >= floor {
            bucket.tokens -= 1.0;
            true
        } else {
            tracing::debug!(key, ?priority, tokens = bucket.tokens, "throttled");
            false
        }
    }
}

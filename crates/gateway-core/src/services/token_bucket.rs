//! Per-client token-bucket rate admission primitive.
//!
//! Each service owns one [`BucketMap`], keyed by client-id, of lazily-created
//! [`TokenBucket`]s. Buckets are never evicted during the process lifetime —
//! absence of a bucket is indistinguishable from a full one (see the design
//! notes in SPEC_FULL.md §9).

use ahash::AHashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// A single client's rate-limit state.
///
/// Invariants: `0.0 <= tokens <= capacity`. Tokens increase only by
/// elapsed-time × rate and decrease only by a successful [`TokenBucket::try_consume`].
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate: f64,
    inner: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a bucket starting full, as specified for lazily-created buckets.
    pub fn new(capacity: f64, rate: f64) -> Self {
        Self {
            capacity,
            rate,
            inner: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempts to admit one request.
    ///
    /// Refills under the same mutex acquisition that performs the decrement,
    /// so the read-modify-write is atomic with respect to other callers.
    /// When `rate <= 0` the bucket always admits (no-op configuration, §4.3).
    pub fn try_consume(&self) -> bool {
        if self.rate <= 0.0 {
            return true;
        }

        let mut state = self.inner.lock().expect("token bucket mutex poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token count, for tests and diagnostics. Triggers a refill first.
    #[cfg(test)]
    pub fn tokens(&self) -> f64 {
        let mut state = self.inner.lock().expect("token bucket mutex poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;
        state.tokens
    }
}

/// Concurrent map of client-id to [`TokenBucket`], created lazily per client.
///
/// Lookup is lock-free (`RwLock::read`); insertion on a miss takes the write
/// lock and resolves creation races by a single-winner check — the loser
/// discards its freshly built bucket and uses the winner's instead.
#[derive(Debug)]
pub struct BucketMap {
    capacity: f64,
    rate: f64,
    buckets: RwLock<AHashMap<String, Arc<TokenBucket>>>,
}

impl BucketMap {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            capacity: burst,
            rate: rate_per_sec,
            buckets: RwLock::new(AHashMap::new()),
        }
    }

    /// Looks up (or lazily creates) the bucket for `client_id` and attempts
    /// to admit one request against it.
    pub fn admit(&self, client_id: &str) -> bool {
        if let Some(bucket) = self.buckets.read().expect("bucket map poisoned").get(client_id) {
            return bucket.try_consume();
        }

        let fresh = Arc::new(TokenBucket::new(self.capacity, self.rate));
        let mut buckets = self.buckets.write().expect("bucket map poisoned");
        let bucket = buckets
            .entry(client_id.to_string())
            .or_insert(fresh)
            .clone();
        drop(buckets);
        bucket.try_consume()
    }
}

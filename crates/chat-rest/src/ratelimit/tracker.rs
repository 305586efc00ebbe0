//! Per-route rate limit bookkeeping
//!
//! Buckets start out keyed by route template plus major parameter. Once the
//! server reports a bucket hash for a template, every template sharing that
//! hash maps onto the same bucket. The global limit is tracked separately
//! and takes precedence over any per-route wait.
//!
//! Every stored deadline is on the local clock. Server timestamps (the
//! `X-RateLimit-Reset` header) are converted with the offset learned from
//! `Date` when they arrive, so relearning the offset never moves a deadline
//! that is already stored.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::headers::RateLimitHeaders;
use crate::route::{Route, RouteKey};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BucketId {
    /// Not yet told which server bucket this template belongs to
    Route(RouteKey),
    /// Server-reported bucket hash
    Shared(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    id: BucketId,
    major: Option<String>,
}

/// How long later callers wait on a discovery call before trying themselves
const DISCOVERY_TIMEOUT_MS: i64 = 10_000;
/// Poll interval while a discovery call is outstanding
const DISCOVERY_POLL_MS: i64 = 50;

/// State of one bucket, times on the local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub limit: Option<u32>,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl Default for BucketSnapshot {
    fn default() -> Self {
        Self {
            limit: None,
            remaining: 1,
            reset_at_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Bucket {
    snapshot: BucketSnapshot,
    /// Set while the call that discovers an unknown bucket's limit is out
    discovery_until_ms: Option<i64>,
}

/// Rate limit state for one token
pub struct RateLimitTracker {
    shared: DashMap<RouteKey, String>,
    buckets: DashMap<BucketKey, Arc<Mutex<Bucket>>>,
    global_reset_ms: AtomicI64,
    /// Server clock minus local clock, learned from the `Date` header
    offset_ms: RwLock<Option<i64>>,
    clock: Clock,
}

/// Wall clock driven by the tokio timer, so paused test time moves it too
struct Clock {
    origin_ms: i64,
    origin: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            origin_ms: chrono::Utc::now().timestamp_millis(),
            origin: Instant::now(),
        }
    }

    fn now_ms(&self) -> i64 {
        self.origin_ms + self.origin.elapsed().as_millis() as i64
    }
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            shared: DashMap::new(),
            buckets: DashMap::new(),
            global_reset_ms: AtomicI64::new(0),
            offset_ms: RwLock::new(None),
            clock: Clock::new(),
        }
    }

    /// How long to wait before `route` may be called; zero reserves a slot
    ///
    /// A bucket whose limit is still unknown lets one call through; others
    /// wait until its response is recorded or the discovery times out.
    pub fn reserve(&self, route: &Route) -> Duration {
        self.reserve_at(route, self.clock.now_ms())
    }

    pub fn reserve_at(&self, route: &Route, now: i64) -> Duration {
        let global_reset = self.global_reset_ms.load(Ordering::Acquire);

        let bucket = self.bucket(route);
        let mut bucket = bucket.lock();

        let bucket_wait = if bucket.snapshot.remaining == 0 {
            bucket.snapshot.reset_at_ms - now
        } else {
            0
        };
        let wait = bucket_wait.max(global_reset - now);
        if wait > 0 {
            tracing::debug!(
                route = %route.key,
                major = route.major.as_deref().unwrap_or("none"),
                wait_ms = wait,
                global = global_reset > now,
                "Delaying request to respect rate limit"
            );
            return Duration::from_millis(wait as u64);
        }

        if bucket.snapshot.limit.is_none() {
            if let Some(until) = bucket.discovery_until_ms.filter(|until| *until > now) {
                tracing::trace!(route = %route.key, "Waiting on the call discovering this bucket");
                return Duration::from_millis((until - now).min(DISCOVERY_POLL_MS) as u64);
            }
            bucket.discovery_until_ms = Some(now + DISCOVERY_TIMEOUT_MS);
        }

        let state = &mut bucket.snapshot;
        if state.remaining == 0 {
            state.remaining = state.limit.unwrap_or(1).max(1);
        }
        state.remaining -= 1;
        Duration::ZERO
    }

    /// Give up a reservation whose request never got a response
    pub fn release(&self, route: &Route) {
        self.bucket(route).lock().discovery_until_ms = None;
    }

    /// Record the rate limit headers of a response to `route`
    pub fn update(&self, route: &Route, headers: &RateLimitHeaders) {
        self.update_at(route, headers, self.clock.now_ms());
    }

    pub fn update_at(&self, route: &Route, headers: &RateLimitHeaders, now: i64) {
        if let Some(date) = headers.date_ms {
            let mut offset = self.offset_ms.write();
            if offset.is_none() {
                *offset = Some(date - now);
                tracing::debug!(offset_ms = date - now, "Calculated server clock offset");
            }
        }

        if let Some(hash) = &headers.bucket {
            let previous = self.shared.insert(route.key.clone(), hash.clone());
            if previous.as_ref() != Some(hash) {
                tracing::trace!(route = %route.key, bucket = %hash, "Route mapped to shared bucket");
            }
        }

        let bucket = self.bucket(route);
        let mut bucket = bucket.lock();
        bucket.discovery_until_ms = None;
        let state = &mut bucket.snapshot;

        if let Some(fixed) = route.hardcoded_limit {
            state.remaining = 0;
            state.reset_at_ms = now + fixed.as_millis() as i64;
            return;
        }

        if let Some(limit) = headers.limit {
            state.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            state.remaining = remaining;
        }
        if let Some(reset) = headers.reset_at_ms {
            state.reset_at_ms = self.to_local(reset);
        } else if let Some(after) = headers.reset_after {
            state.reset_at_ms = now + after.as_millis() as i64;
        }
    }

    /// Record a 429 response
    ///
    /// The bucket is emptied until `retry_after` has passed; a global 429
    /// blocks every route. The clock offset is recalculated from the next
    /// response; deadlines already stored are unaffected.
    pub fn rate_limited(&self, route: &Route, retry_after: Duration, global: bool) {
        self.rate_limited_at(route, retry_after, global, self.clock.now_ms());
    }

    pub fn rate_limited_at(
        &self,
        route: &Route,
        retry_after: Duration,
        global: bool,
        now: i64,
    ) {
        *self.offset_ms.write() = None;
        let reset = now + retry_after.as_millis() as i64;

        if global {
            self.global_reset_ms.fetch_max(reset, Ordering::AcqRel);
            tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "Hit global rate limit");
        }

        let bucket = self.bucket(route);
        let mut bucket = bucket.lock();
        bucket.discovery_until_ms = None;
        bucket.snapshot.remaining = 0;
        bucket.snapshot.reset_at_ms = bucket.snapshot.reset_at_ms.max(reset);
    }

    pub fn snapshot(&self, route: &Route) -> BucketSnapshot {
        self.bucket(route).lock().snapshot
    }

    pub fn offset_ms(&self) -> Option<i64> {
        *self.offset_ms.read()
    }

    pub fn global_reset_ms(&self) -> i64 {
        self.global_reset_ms.load(Ordering::Acquire)
    }

    /// Server timestamp to local clock
    fn to_local(&self, server_ms: i64) -> i64 {
        server_ms - self.offset_ms().unwrap_or(0)
    }

    fn bucket(&self, route: &Route) -> Arc<Mutex<Bucket>> {
        let id = match self.shared.get(&route.key) {
            Some(hash) => BucketId::Shared(hash.value().clone()),
            None => BucketId::Route(route.key.clone()),
        };
        let key = BucketKey {
            id,
            major: route.major.clone(),
        };
        Arc::clone(self.buckets.entry(key).or_default().value())
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

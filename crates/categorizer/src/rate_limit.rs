use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Buckets tracked before idle (full) ones are dropped.
const MAX_TRACKED_USERS: usize = 10_000;

/// One token bucket per user; each refills at `rps` tokens per second and bursts to `rps`.
#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    max_users: usize,
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl Bucket {
    fn refilled(&self, now: Instant, rps: f64) -> f64 {
        let elapsed = now.duration_since(self.last).as_secs_f64();
        (self.tokens + elapsed * rps).min(rps)
    }
}

impl RateLimiter {
    /// `None` for a zero rate, which disables limiting.
    pub fn new(rps: u32) -> Option<Self> {
        Self::with_max_users(rps, MAX_TRACKED_USERS)
    }

    fn with_max_users(rps: u32, max_users: usize) -> Option<Self> {
        if rps == 0 {
            return None;
        }
        Some(Self {
            rps,
            max_users,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Take one token from `user_id`'s bucket.
    pub async fn check(&self, user_id: &str) -> Result<(), String> {
        let rps = f64::from(self.rps);
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= self.max_users && !buckets.contains_key(user_id) {
            // A full bucket is indistinguishable from a fresh one.
            buckets.retain(|_, bucket| bucket.refilled(now, rps) < rps);
        }

        let bucket = buckets.entry(user_id.to_string()).or_insert(Bucket {
            tokens: rps,
            last: now,
        });
        bucket.tokens = bucket.refilled(now, rps);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / rps);
        Err(format!(
            "rate limit exceeded (RATE_LIMIT_RPS={}): try again in ~{}ms",
            self.rps,
            wait.as_millis()
        ))
    }

    #[cfg(test)]
    async fn tracked_users(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

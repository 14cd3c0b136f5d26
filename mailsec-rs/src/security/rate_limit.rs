//! Per-client request rate limiting for the HTTP API
//!
//! The limiter is a fixed window counter keyed by client address. Storage is
//! behind [`RateLimitStore`] so a shared backend can replace the in-memory
//! map when several instances sit behind one load balancer.
//!
//! # Example
//! ```no_run
//! use mailsec_rs::security::rate_limit::{InMemoryRateLimitStore, RateLimitStore};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let store = InMemoryRateLimitStore::new(30, Duration::from_secs(60));
//!
//! if store.hit("192.0.2.1").await {
//!     println!("Request allowed");
//! } else {
//!     println!("Rate limit exceeded");
//! }
//! # }
//! ```

use crate::config::RateLimitConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Rate limit backend
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one request for `key`; `false` once the key is over its limit
    async fn hit(&self, key: &str) -> bool;

    /// Drop windows that have expired, returning how many were removed
    async fn evict_expired(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed window counter held in process memory
pub struct InMemoryRateLimitStore {
    windows: RwLock<HashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl InMemoryRateLimitStore {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Requests counted in the current window for `key`
    pub async fn count(&self, key: &str) -> u32 {
        let windows = self.windows.read().await;
        windows
            .get(key)
            .filter(|w| w.started.elapsed() <= self.window)
            .map(|w| w.count)
            .unwrap_or(0)
    }

    pub async fn reset(&self, key: &str) {
        self.windows.write().await.remove(key);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });

        if now.duration_since(entry.started) > self.window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count >= self.max_requests {
            warn!("Rate limit exceeded for {}", key);
            return false;
        }

        entry.count += 1;
        true
    }

    async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) <= self.window);

        let evicted = before - windows.len();
        if evicted > 0 {
            debug!("Evicted {} expired rate limit window(s)", evicted);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_per_key() {
        let store = InMemoryRateLimitStore::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(store.hit("192.0.2.1").await);
        }
        assert!(!store.hit("192.0.2.1").await);
        assert_eq!(store.count("192.0.2.1").await, 3);

        // Other clients are unaffected
        assert!(store.hit("192.0.2.2").await);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let store = InMemoryRateLimitStore::new(1, Duration::from_millis(50));

        assert!(store.hit("client").await);
        assert!(!store.hit("client").await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.hit("client").await);
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let store = InMemoryRateLimitStore::new(5, Duration::from_millis(50));
        store.hit("a").await;
        store.hit("b").await;
        assert_eq!(store.tracked_keys().await, 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.hit("c").await;

        assert_eq!(store.evict_expired().await, 2);
        assert_eq!(store.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let store = InMemoryRateLimitStore::new(1, Duration::from_secs(60));
        store.hit("client").await;
        assert!(!store.hit("client").await);

        store.reset("client").await;
        assert!(store.hit("client").await);
    }
}

//! Per-host request spacing.
//!
//! [`RateLimiter`] enforces a minimum interval between two requests to the
//! same host. The first request to a host proceeds immediately. Requests to
//! different hosts never wait on each other.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::fetch::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(500));
//! limiter.acquire("https://seekingalpha.com/article/1").await; // immediate
//! limiter.acquire("https://seekingalpha.com/article/2").await; // waits ~500ms
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Earliest start of the next request to one host, `None` before the first.
type NextSlot = Arc<Mutex<Option<Instant>>>;

/// Per-host rate limiter, shareable behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    disabled: bool,
    /// Slots sit behind `Arc` so the map shard lock is released before awaiting.
    hosts: DashMap<String, NextSlot>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum interval per host.
    ///
    /// A zero interval yields a disabled limiter.
    #[must_use]
    #[instrument(level = "debug", skip_all, fields(interval_ms = interval.as_millis()))]
    pub fn new(interval: Duration) -> Self {
        if interval.is_zero() {
            return Self::disabled();
        }
        debug!("creating rate limiter");
        Self {
            interval,
            disabled: false,
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            disabled: true,
            hosts: DashMap::new(),
        }
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the minimum interval between requests to one host.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for `url`'s host slot, then books the next one an interval later.
    ///
    /// Concurrent callers for one host queue on the slot lock and leave in
    /// turn, each at least one interval after the previous.
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let host = extract_host(url);
        let slot = Arc::clone(self.hosts.entry(host).or_default().value());
        let mut next = slot.lock().await;

        if let Some(at) = next.filter(|at| *at > Instant::now()) {
            debug!(wait_ms = (at - Instant::now()).as_millis(), "pacing request");
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }
}

/// Extracts the lower-cased host from a URL, or `"unknown"` when unparseable.
///
/// ```
/// use harvester_core::fetch::extract_host;
///
/// assert_eq!(extract_host("https://SeekingAlpha.com/article/1"), "seekingalpha.com");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

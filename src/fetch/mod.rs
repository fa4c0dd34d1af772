//! Page fetching: retrying GET requests paced per host.

mod client;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{FetchResponse, FetchStats, Fetcher};
pub use error::FetchError;
pub use rate_limiter::{RateLimiter, extract_host};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy, StatusClass, classify_status};

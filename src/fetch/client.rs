//! HTTP GET with bounded retry, backoff and per-host pacing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::COOKIE;
use tracing::{debug, instrument, warn};

use super::error::FetchError;
use super::rate_limiter::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy, StatusClass, classify_status};
use crate::auth::Credentials;
use crate::config::FetchSettings;

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl FetchResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Counters describing what the fetcher did during a run.
#[derive(Debug, Default)]
pub struct FetchStats {
    attempts: AtomicUsize,
    backoff_waits: AtomicUsize,
    failed_statuses: AtomicUsize,
    connection_failures: AtomicUsize,
}

impl FetchStats {
    /// Requests sent, including retries.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Backoff sleeps taken between attempts.
    #[must_use]
    pub fn backoff_waits(&self) -> usize {
        self.backoff_waits.load(Ordering::SeqCst)
    }

    /// Attempts answered with a non-2xx status.
    #[must_use]
    pub fn failed_statuses(&self) -> usize {
        self.failed_statuses.load(Ordering::SeqCst)
    }

    /// Attempts that failed before a full response was read.
    #[must_use]
    pub fn connection_failures(&self) -> usize {
        self.connection_failures.load(Ordering::SeqCst)
    }

    fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Rate-limited, retrying page fetcher.
///
/// Cheap to clone; clones share the HTTP connection pool, the rate limiter
/// and the stats counters.
///
/// # Example
///
/// ```no_run
/// use harvester_core::auth::Credentials;
/// use harvester_core::config::FetchSettings;
/// use harvester_core::fetch::Fetcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Fetcher::from_settings(&FetchSettings::default())?;
/// let page = fetcher
///     .fetch("https://seekingalpha.com/article/239509", &Credentials::anonymous())
///     .await?;
/// println!("{} -> {} bytes", page.status, page.body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<FetchStats>,
}

impl Fetcher {
    /// Builds a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip_all, fields(max_attempts = settings.max_attempts))]
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(FetchError::Client)?;

        let retry_policy = RetryPolicy::new(
            settings.max_attempts,
            settings.backoff_base(),
            settings.backoff_max(),
            2.0,
        );
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            settings.rate_limit_ms,
        )));

        debug!(
            rate_limit_ms = settings.rate_limit_ms,
            backoff_base_ms = settings.backoff_base_ms,
            "creating fetcher"
        );

        Ok(Self {
            client,
            retry_policy,
            rate_limiter,
            stats: Arc::new(FetchStats::default()),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the rate limiter (e.g. to share one across fetchers).
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the shared stats counters.
    #[must_use]
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Issues a GET for `url`, authenticated when `credentials` is non-empty.
    ///
    /// Each attempt is paced by the rate limiter. Connection failures and
    /// non-2xx statuses are retried with exponential backoff until the
    /// attempt budget is spent. 404 and 410 are returned at once.
    ///
    /// # Returns
    ///
    /// The first 2xx response, otherwise the last response obtained.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] when no attempt produced a response.
    #[instrument(skip(self, credentials), fields(authenticated = !credentials.is_empty()))]
    pub async fn fetch(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<FetchResponse, FetchError> {
        let cookie_header = credentials.to_header_value();
        let mut last_response: Option<FetchResponse> = None;
        let mut attempt = 1;

        loop {
            self.rate_limiter.acquire(url).await;
            FetchStats::increment(&self.stats.attempts);
            debug!(url, attempt, "fetching");

            match self.send_once(url, cookie_header.as_deref()).await {
                Ok(response) if response.is_success() => {
                    debug!(url, attempt, status = response.status, "fetched");
                    return Ok(response);
                }
                Ok(response) => {
                    FetchStats::increment(&self.stats.failed_statuses);
                    warn!(url, attempt, status = response.status, "request blocked or failed");

                    let retryable = classify_status(response.status) == StatusClass::Transient;
                    match self.backoff(retryable, attempt).await {
                        Some(next) => {
                            attempt = next;
                            last_response = Some(response);
                        }
                        None => return Ok(response),
                    }
                }
                Err(source) => {
                    FetchStats::increment(&self.stats.connection_failures);
                    warn!(url, attempt, error = %source, "connection failure");

                    match self.backoff(true, attempt).await {
                        Some(next) => attempt = next,
                        None => {
                            return match last_response {
                                Some(response) => Ok(response),
                                None => Err(FetchError::network(url, attempt, source)),
                            };
                        }
                    }
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        cookie_header: Option<&str>,
    ) -> Result<FetchResponse, reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(cookie) = cookie_header {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchResponse {
            url: final_url,
            status,
            body,
        })
    }

    /// Sleeps before the next attempt, or returns `None` when the budget is spent.
    async fn backoff(&self, retryable: bool, attempt: u32) -> Option<u32> {
        match self.retry_policy.should_retry(retryable, attempt) {
            RetryDecision::Retry { delay, attempt } => {
                FetchStats::increment(&self.stats.backoff_waits);
                debug!(delay_ms = delay.as_millis(), next_attempt = attempt, "backing off");
                tokio::time::sleep(delay).await;
                Some(attempt)
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(%reason, "giving up");
                None
            }
        }
    }
}

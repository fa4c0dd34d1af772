//! Error types for page fetches.

use thiserror::Error;

/// Errors surfaced by [`Fetcher::fetch`](super::Fetcher::fetch).
///
/// Non-2xx statuses are not errors at this layer; they come back as a
/// [`FetchResponse`](super::FetchResponse) for the caller to interpret.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt failed at the connection level (refused, reset, timeout,
    /// body cut off).
    #[error("network error fetching {url} after {attempts} attempt(s): {source}")]
    Network {
        /// The URL that could not be fetched.
        url: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Creates a network error after `attempts` connection failures.
    pub fn network(url: impl Into<String>, attempts: u32, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            attempts,
            source,
        }
    }

    /// Returns `true` for connection-level failures.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

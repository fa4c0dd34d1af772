//! Article-id discovery by walking a symbol's paginated listing.
//!
//! Pages are fetched in order over the half-open range `[start_page, end_page)`.
//! The first page that returns successfully but contains no article
//! references ends the walk. What happens on a failed page is governed by
//! [`FailedPagePolicy`].

use std::sync::LazyLock;
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::config::{DiscoverySettings, Endpoints};
use crate::fetch::Fetcher;

#[allow(clippy::expect_used)]
static ARTICLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"article/(\d+)").expect("article reference pattern is valid")
});

/// What to do with a listing page that could not be fetched or returned non-2xx.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedPagePolicy {
    /// Treat the page as contributing no ids and continue with the next index.
    #[default]
    Skip,
    /// End discovery at the failed page.
    Stop,
}

/// Extracts article ids from a listing page body, in document order.
///
/// Duplicates are kept.
///
/// ```
/// use harvester_core::discover::extract_article_ids;
///
/// let body = r#"<a href="/article/101-x">x</a><a href="/article/7">y</a>"#;
/// assert_eq!(extract_article_ids(body), vec!["101", "7"]);
/// ```
#[must_use]
pub fn extract_article_ids(body: &str) -> Vec<String> {
    ARTICLE_REF
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Walks listing pages and yields article ids.
#[derive(Debug, Clone)]
pub struct Discoverer {
    fetcher: Fetcher,
    endpoints: Endpoints,
    credentials: Credentials,
    page_interval: Duration,
    failed_page_policy: FailedPagePolicy,
}

struct PageCursor {
    symbol: String,
    page: u32,
    end_page: u32,
    fetched_any: bool,
}

impl Discoverer {
    /// Creates a discoverer with default pacing and policy.
    #[must_use]
    pub fn new(fetcher: Fetcher, endpoints: Endpoints, credentials: Credentials) -> Self {
        let defaults = DiscoverySettings::default();
        Self {
            fetcher,
            endpoints,
            credentials,
            page_interval: defaults.page_interval(),
            failed_page_policy: defaults.failed_page_policy,
        }
    }

    /// Applies pacing and failed-page policy from configuration.
    #[must_use]
    pub fn with_settings(mut self, settings: &DiscoverySettings) -> Self {
        self.page_interval = settings.page_interval();
        self.failed_page_policy = settings.failed_page_policy;
        self
    }

    /// Lazily yields ids found on pages `start_page..end_page` for `symbol`.
    ///
    /// The stream is finite and not restartable. Nothing is fetched until it
    /// is polled.
    pub fn discover(
        &self,
        symbol: &str,
        start_page: u32,
        end_page: u32,
    ) -> impl Stream<Item = String> + '_ {
        let cursor = PageCursor {
            symbol: symbol.to_string(),
            page: start_page,
            end_page,
            fetched_any: false,
        };

        stream::unfold(Some(cursor), move |cursor| async move {
            let mut cursor = cursor?;
            if cursor.page >= cursor.end_page {
                debug!(symbol = %cursor.symbol, "page range exhausted");
                return None;
            }

            if cursor.fetched_any && !self.page_interval.is_zero() {
                tokio::time::sleep(self.page_interval).await;
            }
            cursor.fetched_any = true;

            let page = cursor.page;
            cursor.page += 1;

            match self.fetch_page(&cursor.symbol, page).await {
                PageResult::Ids(ids) => Some((ids, Some(cursor))),
                PageResult::Empty => {
                    info!(symbol = %cursor.symbol, page, "no article references, stopping");
                    None
                }
                PageResult::Failed => match self.failed_page_policy {
                    FailedPagePolicy::Skip => Some((Vec::new(), Some(cursor))),
                    FailedPagePolicy::Stop => {
                        info!(symbol = %cursor.symbol, page, "stopping at failed page");
                        None
                    }
                },
            }
        })
        .flat_map(stream::iter)
    }

    /// Collects [`discover`](Self::discover) into a vector.
    pub async fn discover_all(&self, symbol: &str, start_page: u32, end_page: u32) -> Vec<String> {
        self.discover(symbol, start_page, end_page).collect().await
    }

    async fn fetch_page(&self, symbol: &str, page: u32) -> PageResult {
        let url = self.endpoints.listing_url(symbol, page);
        match self.fetcher.fetch(&url, &self.credentials).await {
            Ok(response) if response.is_success() => {
                let ids = extract_article_ids(&response.body);
                debug!(symbol, page, found = ids.len(), "listing page parsed");
                if ids.is_empty() {
                    PageResult::Empty
                } else {
                    PageResult::Ids(ids)
                }
            }
            Ok(response) => {
                warn!(symbol, page, status = response.status, "listing page failed");
                PageResult::Failed
            }
            Err(e) => {
                warn!(symbol, page, error = %e, "listing page unreachable");
                PageResult::Failed
            }
        }
    }
}

enum PageResult {
    Ids(Vec<String>),
    Empty,
    Failed,
}

//! Article page parsing.
//!
//! An article is fetched twice. The authenticated page carries the metadata
//! (some of it is only rendered for a logged-in session) and decides
//! validity: exactly one primary-ticker anchor must be present. The
//! anonymous page supplies the full body text, cut at the disclosure
//! paragraph.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::article::{ArticleOutcome, ArticleParser};
//! use harvester_core::auth::Credentials;
//! use harvester_core::config::{Endpoints, FetchSettings};
//! use harvester_core::fetch::Fetcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::from_settings(&FetchSettings::default())?;
//! let parser = ArticleParser::new(fetcher, Endpoints::default());
//! let credentials = Credentials::load(std::path::Path::new("raw_cookie.txt"))?;
//! if let ArticleOutcome::Valid(article) = parser.parse("239509", &credentials).await? {
//!     println!("{} {}", article.ticker, article.title);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod page;

pub use error::ArticleError;
pub use page::{extract_body, extract_ticker, parse_date_prefix};

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::auth::Credentials;
use crate::config::Endpoints;
use crate::fetch::Fetcher;
use page::{MetadataScan, scan_metadata};

/// A parsed single-ticker article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// External article id.
    pub id: String,
    /// Primary ticker symbol.
    pub ticker: String,
    /// Publication date.
    pub publication_date: NaiveDate,
    /// Author names in page order.
    pub authors: Vec<String>,
    /// Headline.
    pub title: String,
    /// Paragraph text before the disclosure, each paragraph newline-terminated.
    pub body: String,
    /// Secondary tickers in page order.
    pub included_symbols: Vec<String>,
    /// Always 0; the site does not expose a like count in the page.
    pub num_likes: i64,
}

impl Article {
    /// Authors joined with `,` as stored.
    #[must_use]
    pub fn authors_joined(&self) -> String {
        self.authors.join(",")
    }

    /// Included symbols joined with `,` as stored.
    #[must_use]
    pub fn included_symbols_joined(&self) -> String {
        self.included_symbols.join(",")
    }
}

/// Result of parsing an article id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleOutcome {
    /// Exactly one primary ticker; all fields extracted.
    Valid(Article),
    /// The single-ticker rule failed; no other field was read.
    Invalid {
        /// How many primary-ticker anchors were found.
        primary_anchors: usize,
    },
}

impl ArticleOutcome {
    /// Returns `true` for [`ArticleOutcome::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Fetches and parses article pages.
#[derive(Debug, Clone)]
pub struct ArticleParser {
    fetcher: Fetcher,
    endpoints: Endpoints,
}

impl ArticleParser {
    /// Creates a parser fetching through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Fetcher, endpoints: Endpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// Parses article `id`.
    ///
    /// The anonymous page is fetched only when the authenticated page passes
    /// validation.
    ///
    /// # Errors
    ///
    /// - [`ArticleError::Fetch`] if either fetch fails at the connection level
    /// - [`ArticleError::MissingElement`] / [`ArticleError::InvalidDate`] if a
    ///   required element of a valid article is absent or malformed
    #[instrument(skip(self, credentials), fields(article_id = %id))]
    pub async fn parse(
        &self,
        id: &str,
        credentials: &Credentials,
    ) -> Result<ArticleOutcome, ArticleError> {
        let url = self.endpoints.article_url(id);

        let authenticated = self
            .fetcher
            .fetch(&url, credentials)
            .await
            .map_err(|e| ArticleError::fetch(id, e))?;
        if !authenticated.is_success() {
            warn!(status = authenticated.status, "authenticated article page not ok");
        }

        let metadata = match scan_metadata(id, &authenticated.body)? {
            MetadataScan::Valid(metadata) => metadata,
            MetadataScan::Invalid { primary_anchors } => {
                info!(primary_anchors, "invalid article, not single-ticker");
                return Ok(ArticleOutcome::Invalid { primary_anchors });
            }
        };

        let anonymous = self
            .fetcher
            .fetch(&url, &Credentials::anonymous())
            .await
            .map_err(|e| ArticleError::fetch(id, e))?;
        if !anonymous.is_success() {
            warn!(status = anonymous.status, "anonymous article page not ok");
        }
        let body = extract_body(&anonymous.body).map_err(|e| ArticleError::query(id, e))?;

        debug!(
            ticker = %metadata.ticker,
            body_len = body.len(),
            authors = metadata.authors.len(),
            "article parsed"
        );

        Ok(ArticleOutcome::Valid(Article {
            id: id.to_string(),
            ticker: metadata.ticker,
            publication_date: metadata.publication_date,
            authors: metadata.authors,
            title: metadata.title,
            body,
            included_symbols: metadata.included_symbols,
            num_likes: 0,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Article {
        Article {
            id: "1".to_string(),
            ticker: "AAPL".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            authors: vec!["A".to_string(), "B".to_string()],
            title: "t".to_string(),
            body: String::new(),
            included_symbols: vec![],
            num_likes: 0,
        }
    }

    #[test]
    fn test_joined_fields() {
        let article = sample();
        assert_eq!(article.authors_joined(), "A,B");
        assert_eq!(article.included_symbols_joined(), "");
    }

    #[test]
    fn test_outcome_is_valid() {
        assert!(ArticleOutcome::Valid(sample()).is_valid());
        assert!(!ArticleOutcome::Invalid { primary_anchors: 2 }.is_valid());
    }
}

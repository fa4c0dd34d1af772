//! Error types for article parsing.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::html::HtmlError;

/// Errors that abort parsing of one article.
///
/// An article failing the single-ticker check is not an error; see
/// [`ArticleOutcome::Invalid`](super::ArticleOutcome::Invalid).
#[derive(Debug, Error)]
pub enum ArticleError {
    /// One of the two page fetches failed at the connection level.
    #[error("article {article_id}: fetch failed: {source}")]
    Fetch {
        /// Article being parsed.
        article_id: String,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// A required element is absent from the authenticated page.
    #[error("article {article_id}: missing required element {element}")]
    MissingElement {
        /// Article being parsed.
        article_id: String,
        /// Description of the missing element.
        element: &'static str,
    },

    /// The publication date attribute is not a `YYYY-MM-DD` date.
    #[error("article {article_id}: unparseable publication date '{value}'")]
    InvalidDate {
        /// Article being parsed.
        article_id: String,
        /// Raw attribute value.
        value: String,
    },

    /// A document query could not be built.
    #[error("article {article_id}: {source}")]
    Query {
        /// Article being parsed.
        article_id: String,
        /// Query error.
        #[source]
        source: HtmlError,
    },
}

impl ArticleError {
    /// Creates a `Fetch` error.
    #[must_use]
    pub fn fetch(article_id: &str, source: FetchError) -> Self {
        Self::Fetch {
            article_id: article_id.to_string(),
            source,
        }
    }

    /// Creates a `MissingElement` error.
    #[must_use]
    pub fn missing(article_id: &str, element: &'static str) -> Self {
        Self::MissingElement {
            article_id: article_id.to_string(),
            element,
        }
    }

    /// Creates a `Query` error.
    #[must_use]
    pub fn query(article_id: &str, source: HtmlError) -> Self {
        Self::Query {
            article_id: article_id.to_string(),
            source,
        }
    }

    /// Returns `true` when the failure happened on the network, not in the page.
    #[must_use]
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

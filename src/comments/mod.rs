//! Comment retrieval for an article.
//!
//! The comment endpoint returns top-level comments keyed by id, each with a
//! nested `children` map of the same shape. [`CommentFetcher`] downloads
//! that payload and hands back one [`FlatComment`] per node in pre-order.

mod tree;

pub use tree::{Comment, CommentPayload, ContentPolicy, FlatComment, flatten, sanitize};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::auth::Credentials;
use crate::config::Endpoints;
use crate::fetch::{FetchError, Fetcher};

/// Errors from fetching or decoding one article's comments.
#[derive(Debug, Error)]
pub enum CommentError {
    /// The comment endpoint could not be reached.
    #[error("comments for article {article_id}: fetch failed: {source}")]
    Fetch {
        /// Owning article.
        article_id: String,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// The response body is not the expected JSON shape.
    #[error("comments for article {article_id}: malformed payload: {source}")]
    Payload {
        /// Owning article.
        article_id: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// A comment's `created_on` has no leading date.
    #[error("comment {comment_id} on article {article_id}: unparseable date '{value}'")]
    InvalidDate {
        /// Owning article.
        article_id: String,
        /// Offending comment.
        comment_id: i64,
        /// Raw timestamp.
        value: String,
    },
}

/// Downloads and flattens comment trees.
#[derive(Debug, Clone)]
pub struct CommentFetcher {
    fetcher: Fetcher,
    endpoints: Endpoints,
    policy: ContentPolicy,
}

impl CommentFetcher {
    /// Creates a fetcher that stores content unchanged.
    #[must_use]
    pub fn new(fetcher: Fetcher, endpoints: Endpoints) -> Self {
        Self {
            fetcher,
            endpoints,
            policy: ContentPolicy::default(),
        }
    }

    /// Sets the content policy applied to every comment.
    #[must_use]
    pub fn with_content_policy(mut self, policy: ContentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches all comments of `article_id`, flattened in pre-order.
    ///
    /// A non-2xx response (including 404 for articles without a discussion)
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// - [`CommentError::Fetch`] on connection failure
    /// - [`CommentError::Payload`] if a 2xx body is not valid comment JSON
    /// - [`CommentError::InvalidDate`] if a comment timestamp is malformed
    #[instrument(skip(self, credentials), fields(article_id = %article_id))]
    pub async fn fetch_comments(
        &self,
        article_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<FlatComment>, CommentError> {
        let url = self.endpoints.comments_url(article_id);
        let response = self
            .fetcher
            .fetch(&url, credentials)
            .await
            .map_err(|source| CommentError::Fetch {
                article_id: article_id.to_string(),
                source,
            })?;

        if !response.is_success() {
            info!(status = response.status, "no comments available");
            return Ok(Vec::new());
        }

        let payload =
            CommentPayload::from_json(&response.body).map_err(|source| CommentError::Payload {
                article_id: article_id.to_string(),
                source,
            })?;

        let flat = flatten(article_id, payload.comments.into_values(), self.policy)?;
        debug!(count = flat.len(), "comments flattened");
        Ok(flat)
    }
}

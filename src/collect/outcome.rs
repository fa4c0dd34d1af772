//! Per-id results and the end-of-run summary.

use std::fmt;

use crate::article::ArticleError;
use crate::comments::CommentError;
use crate::store::{StoreError, WriteOutcome};

/// Pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Article page fetch and parse.
    Article,
    /// Comment payload fetch and flatten.
    Comments,
    /// Database writes and commit.
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Article => "article",
            Self::Comments => "comments",
            Self::Store => "store",
        })
    }
}

/// Why an id was skipped without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The article did not have exactly one primary ticker.
    InvalidArticle {
        /// Primary-ticker anchors found.
        primary_anchors: usize,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArticle { primary_anchors } => {
                write!(f, "not single-ticker ({primary_anchors} primary anchors)")
            }
        }
    }
}

/// Why processing of an id failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// A page or payload could not be fetched.
    Network {
        /// Failing stage.
        stage: Stage,
        /// Error text.
        message: String,
    },
    /// A page or payload did not have the expected content.
    Parse {
        /// Failing stage.
        stage: Stage,
        /// Error text.
        message: String,
    },
    /// A write or the commit failed; nothing was stored for the id.
    Store {
        /// Error text.
        message: String,
    },
}

impl FailureReason {
    /// Stage the failure happened in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Network { stage, .. } | Self::Parse { stage, .. } => *stage,
            Self::Store { .. } => Stage::Store,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { stage, message } => write!(f, "{stage} network failure: {message}"),
            Self::Parse { stage, message } => write!(f, "{stage} parse failure: {message}"),
            Self::Store { message } => write!(f, "store failure: {message}"),
        }
    }
}

impl From<ArticleError> for FailureReason {
    fn from(error: ArticleError) -> Self {
        let message = error.to_string();
        if error.is_fetch() {
            Self::Network {
                stage: Stage::Article,
                message,
            }
        } else {
            Self::Parse {
                stage: Stage::Article,
                message,
            }
        }
    }
}

impl From<CommentError> for FailureReason {
    fn from(error: CommentError) -> Self {
        let message = error.to_string();
        match error {
            CommentError::Fetch { .. } => Self::Network {
                stage: Stage::Comments,
                message,
            },
            CommentError::Payload { .. } | CommentError::InvalidDate { .. } => Self::Parse {
                stage: Stage::Comments,
                message,
            },
        }
    }
}

impl From<StoreError> for FailureReason {
    fn from(error: StoreError) -> Self {
        Self::Store {
            message: error.to_string(),
        }
    }
}

/// What was written for a stored id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredCounts {
    /// Article write result; `None` in comments-only runs.
    pub article: Option<WriteOutcome>,
    /// Comments newly inserted.
    pub comments_inserted: usize,
    /// Comments already present.
    pub comments_duplicate: usize,
}

/// Result of processing one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOutcome {
    /// Records were committed (possibly all duplicates).
    Stored(StoredCounts),
    /// Nothing to store; not an error.
    Skipped(SkipReason),
    /// Processing failed; the run continues with the next id.
    Failed(FailureReason),
}

/// One failed id in a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedId {
    /// Zero-based position in the id list.
    pub position: usize,
    /// Article id.
    pub article_id: String,
    /// What went wrong.
    pub reason: FailureReason,
}

/// Aggregate of a collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ids taken from the list (stored + skipped + failed).
    pub processed: usize,
    /// Ids whose records were committed.
    pub stored: usize,
    /// Ids skipped as invalid.
    pub skipped: usize,
    /// Ids that failed.
    pub failed: usize,
    /// Articles newly inserted.
    pub articles_inserted: usize,
    /// Comments newly inserted.
    pub comments_inserted: usize,
    /// Article and comment inserts that hit an existing key.
    pub duplicates: usize,
    /// The run ended because the stop flag was raised.
    pub stopped_early: bool,
    /// Position of the last id whose transaction committed.
    pub last_committed: Option<usize>,
    /// Details of every failure.
    pub failures: Vec<FailedId>,
}

impl RunSummary {
    /// Folds one outcome into the totals.
    pub fn record(&mut self, position: usize, article_id: &str, outcome: &IdOutcome) {
        self.processed += 1;
        match outcome {
            IdOutcome::Stored(counts) => {
                self.stored += 1;
                match counts.article {
                    Some(WriteOutcome::Inserted) => self.articles_inserted += 1,
                    Some(WriteOutcome::Duplicate) => self.duplicates += 1,
                    None => {}
                }
                self.comments_inserted += counts.comments_inserted;
                self.duplicates += counts.comments_duplicate;
            }
            IdOutcome::Skipped(_) => self.skipped += 1,
            IdOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(FailedId {
                    position,
                    article_id: article_id.to_string(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_aggregates_each_kind() {
        let mut summary = RunSummary::default();
        summary.record(
            0,
            "1",
            &IdOutcome::Stored(StoredCounts {
                article: Some(WriteOutcome::Inserted),
                comments_inserted: 3,
                comments_duplicate: 1,
            }),
        );
        summary.record(
            1,
            "2",
            &IdOutcome::Stored(StoredCounts {
                article: Some(WriteOutcome::Duplicate),
                ..StoredCounts::default()
            }),
        );
        summary.record(
            2,
            "3",
            &IdOutcome::Skipped(SkipReason::InvalidArticle { primary_anchors: 0 }),
        );
        summary.record(
            3,
            "4",
            &IdOutcome::Failed(FailureReason::Store {
                message: "disk full".to_string(),
            }),
        );

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.articles_inserted, 1);
        assert_eq!(summary.comments_inserted, 3);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(summary.failures[0].article_id, "4");
        assert_eq!(summary.failures[0].reason.stage(), Stage::Store);
    }

    #[test]
    fn test_article_error_classification() {
        let parse = FailureReason::from(ArticleError::missing("7", "h1 title"));
        assert!(matches!(parse, FailureReason::Parse { stage: Stage::Article, .. }));
        assert!(parse.to_string().contains("article parse failure"));
    }

    #[test]
    fn test_comment_error_classification() {
        let reason = FailureReason::from(CommentError::InvalidDate {
            article_id: "7".to_string(),
            comment_id: 1,
            value: "x".to_string(),
        });
        assert_eq!(reason.stage(), Stage::Comments);
    }
}

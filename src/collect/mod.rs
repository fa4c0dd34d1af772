//! Collection run: drives article ids through parse, comments and store.
//!
//! Ids are processed one at a time. Each id gets its own transaction:
//! article first, then its comments, then the run checkpoint, then commit.
//! A failure on one id is recorded and the run moves on.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::article::ArticleParser;
//! use harvester_core::auth::Credentials;
//! use harvester_core::collect::{Collector, RunOptions};
//! use harvester_core::comments::CommentFetcher;
//! use harvester_core::config::HarvestConfig;
//! use harvester_core::fetch::Fetcher;
//! use harvester_core::store::Store;
//! use harvester_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarvestConfig::default();
//! let fetcher = Fetcher::from_settings(&config.fetch)?;
//! let db = Database::new(&config.database_path).await?;
//! let collector = Collector::new(
//!     ArticleParser::new(fetcher.clone(), config.endpoints.clone()),
//!     CommentFetcher::new(fetcher, config.endpoints.clone()),
//!     Store::new(&db),
//!     Credentials::anonymous(),
//! );
//! let ids = vec!["239509".to_string()];
//! let summary = collector.run(&ids, &RunOptions::default()).await?;
//! println!("stored {} of {}", summary.stored, summary.processed);
//! # Ok(())
//! # }
//! ```

mod outcome;

pub use outcome::{
    FailedId, FailureReason, IdOutcome, RunSummary, SkipReason, Stage, StoredCounts,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use crate::article::{ArticleOutcome, ArticleParser};
use crate::auth::Credentials;
use crate::comments::{CommentFetcher, FlatComment};
use crate::ids::slice_ids;
use crate::store::{Store, StoreError, StoreTransaction, WriteOutcome};

/// Run key used when none is given.
pub const DEFAULT_RUN_KEY: &str = "default";

/// Options of one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Only fetch and store comments; skip article pages.
    pub comments_only: bool,
    /// First list index to process.
    pub start_index: usize,
    /// Index after the last one to process; `None` is the end of the list.
    pub stop_index: Option<usize>,
    /// Continue after the checkpoint of `run_key`, if there is one.
    pub resume: bool,
    /// Name under which progress is checkpointed.
    pub run_key: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            comments_only: false,
            start_index: 0,
            stop_index: None,
            resume: false,
            run_key: DEFAULT_RUN_KEY.to_string(),
        }
    }
}

/// Percentage of `total` done once the id at zero-based `position` is finished.
#[allow(clippy::cast_precision_loss)]
fn percent_done(position: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (position + 1) as f64 / total as f64 * 100.0
}

/// Sequential collection orchestrator.
#[derive(Debug, Clone)]
pub struct Collector {
    articles: ArticleParser,
    comments: CommentFetcher,
    store: Store,
    credentials: Credentials,
    stop: Arc<AtomicBool>,
}

impl Collector {
    /// Creates a collector. Authenticated requests use `credentials`.
    #[must_use]
    pub fn new(
        articles: ArticleParser,
        comments: CommentFetcher,
        store: Store,
        credentials: Credentials,
    ) -> Self {
        Self {
            articles,
            comments,
            store,
            credentials,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses an externally owned stop flag (e.g. one set by a signal handler).
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that ends the run before the next id when set.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Processes `ids[start_index..stop_index]`.
    ///
    /// Per-id failures never end the run; they are counted in the returned
    /// summary. The stop flag is checked before each id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the resume checkpoint cannot be read.
    #[instrument(skip(self, ids, options), fields(total = ids.len(), run_key = %options.run_key))]
    pub async fn run(&self, ids: &[String], options: &RunOptions) -> Result<RunSummary, StoreError> {
        let mut start = options.start_index;
        if options.resume {
            if let Some(checkpoint) = self.store.load_checkpoint(&options.run_key).await? {
                info!(
                    position = checkpoint.position,
                    article_id = %checkpoint.article_id,
                    "resuming after checkpoint"
                );
                start = start.max(checkpoint.position + 1);
            }
        }
        let window = slice_ids(ids, start, options.stop_index);

        let mut summary = RunSummary::default();
        for (offset, article_id) in window.iter().enumerate() {
            let position = start + offset;
            if self.stop.load(Ordering::SeqCst) {
                warn!(position, "stop requested, ending run");
                summary.stopped_early = true;
                break;
            }

            let outcome = self.process(position, article_id, options).await;
            match &outcome {
                IdOutcome::Failed(reason) => {
                    warn!(position, article_id = %article_id, reason = %reason, "id failed, continuing");
                }
                IdOutcome::Skipped(reason) => {
                    summary.last_committed = Some(position);
                    info!(article_id = %article_id, reason = %reason, "id skipped");
                }
                IdOutcome::Stored(_) => summary.last_committed = Some(position),
            }
            summary.record(position, article_id, &outcome);

            info!(
                "{:.4}% done, article {} of {} (id {article_id})",
                percent_done(position, ids.len()),
                position + 1,
                ids.len()
            );
        }

        info!(
            processed = summary.processed,
            stored = summary.stored,
            skipped = summary.skipped,
            failed = summary.failed,
            comments = summary.comments_inserted,
            duplicates = summary.duplicates,
            stopped_early = summary.stopped_early,
            "collection run finished"
        );
        Ok(summary)
    }

    async fn process(&self, position: usize, article_id: &str, options: &RunOptions) -> IdOutcome {
        let article = if options.comments_only {
            None
        } else {
            match self.articles.parse(article_id, &self.credentials).await {
                Ok(ArticleOutcome::Valid(article)) => Some(article),
                Ok(ArticleOutcome::Invalid { primary_anchors }) => {
                    let reason = SkipReason::InvalidArticle { primary_anchors };
                    return match self.checkpoint_only(position, article_id, options).await {
                        Ok(()) => IdOutcome::Skipped(reason),
                        Err(e) => IdOutcome::Failed(e.into()),
                    };
                }
                Err(e) => return IdOutcome::Failed(e.into()),
            }
        };

        let comments = match self
            .comments
            .fetch_comments(article_id, &self.credentials)
            .await
        {
            Ok(comments) => comments,
            Err(e) => return IdOutcome::Failed(e.into()),
        };
        if comments.is_empty() {
            info!(article_id, "no comments found");
        }

        let result = async {
            let mut tx = self.store.begin().await?;
            let article_outcome = match &article {
                Some(article) => Some(tx.write_article(article).await?),
                None => None,
            };
            let mut counts = write_comments(&mut tx, &comments).await?;
            counts.article = article_outcome;
            tx.save_checkpoint(&options.run_key, position, article_id).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(counts)
        }
        .await;

        match result {
            Ok(counts) => IdOutcome::Stored(counts),
            Err(e) => IdOutcome::Failed(e.into()),
        }
    }

    async fn checkpoint_only(
        &self,
        position: usize,
        article_id: &str,
        options: &RunOptions,
    ) -> Result<(), StoreError> {
        let mut tx = self.store.begin().await?;
        tx.save_checkpoint(&options.run_key, position, article_id).await?;
        tx.commit().await
    }
}

async fn write_comments(
    tx: &mut StoreTransaction,
    comments: &[FlatComment],
) -> Result<StoredCounts, StoreError> {
    let mut counts = StoredCounts::default();
    for comment in comments {
        match tx.write_comment(comment).await? {
            WriteOutcome::Inserted => counts.comments_inserted += 1,
            WriteOutcome::Duplicate => counts.comments_duplicate += 1,
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_done() {
        assert!((percent_done(0, 4) - 25.0).abs() < f64::EPSILON);
        assert!((percent_done(3, 4) - 100.0).abs() < f64::EPSILON);
        assert!((percent_done(0, 0) - 100.0).abs() < f64::EPSILON);
        assert_eq!(format!("{:.4}", percent_done(0, 3)), "33.3333");
    }

    #[test]
    fn test_run_options_default() {
        let options = RunOptions::default();
        assert!(!options.comments_only);
        assert!(!options.resume);
        assert_eq!(options.start_index, 0);
        assert_eq!(options.stop_index, None);
        assert_eq!(options.run_key, DEFAULT_RUN_KEY);
    }
}

//! Persistence of articles, comments and run checkpoints.
//!
//! Writes happen inside a [`StoreTransaction`], one per processed article
//! id. Inserting a record whose key already exists is not an error: the
//! existing row is kept and [`WriteOutcome::Duplicate`] is returned, so a
//! run can be repeated without creating or overwriting rows.

mod error;

pub use error::{StoreError, StoreErrorKind};

use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::{Row, Transaction};
use tracing::{debug, info, instrument};

use crate::article::Article;
use crate::comments::FlatComment;
use crate::db::Database;

/// Result of a duplicate-tolerant insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was stored.
    Inserted,
    /// A row with the same key already existed and was left untouched.
    Duplicate,
}

/// Last committed position of a named collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Run identifier.
    pub run_key: String,
    /// Zero-based index into the id list.
    pub position: usize,
    /// Id at that position.
    pub article_id: String,
}

/// Entry point for persistence.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Starts a transaction. It rolls back if dropped without
    /// [`commit`](StoreTransaction::commit).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if no connection is available.
    pub async fn begin(&self) -> Result<StoreTransaction, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::new("begin transaction", e))?;
        Ok(StoreTransaction { tx })
    }

    /// Loads the checkpoint for `run_key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn load_checkpoint(&self, run_key: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query(
            "SELECT run_key, position, article_id FROM collection_checkpoints WHERE run_key = ?",
        )
        .bind(run_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::new(format!("load checkpoint {run_key}"), e))?;

        Ok(row.map(|row| {
            let position: i64 = row.get("position");
            Checkpoint {
                run_key: row.get("run_key"),
                position: usize::try_from(position).unwrap_or(0),
                article_id: row.get("article_id"),
            }
        }))
    }

    /// Number of stored articles.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn article_count(&self) -> Result<i64, StoreError> {
        self.count("articles").await
    }

    /// Number of stored comments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn comment_count(&self) -> Result<i64, StoreError> {
        self.count("comments").await
    }

    async fn count(&self, table: &'static str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::new(format!("count {table}"), e))?;
        Ok(count)
    }
}

/// Writes covered by one commit.
pub struct StoreTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl std::fmt::Debug for StoreTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTransaction").finish_non_exhaustive()
    }
}

impl StoreTransaction {
    /// Inserts an article unless one with the same id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for any failure other than a duplicate id.
    #[instrument(skip(self, article), fields(article_id = %article.id))]
    pub async fn write_article(&mut self, article: &Article) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO articles \
             (id, ticker, published_date, author, title, text, num_likes, included_symbols) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&article.id)
        .bind(&article.ticker)
        .bind(article.publication_date.format("%Y-%m-%d").to_string())
        .bind(article.authors_joined())
        .bind(&article.title)
        .bind(&article.body)
        .bind(article.num_likes)
        .bind(article.included_symbols_joined())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Inserted),
            Err(e) => {
                let err = StoreError::new(format!("insert article {}", article.id), e);
                if err.is_duplicate() {
                    info!("duplicate article, keeping stored row");
                    Ok(WriteOutcome::Duplicate)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Inserts a comment unless one with the same id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for any failure other than a duplicate id.
    pub async fn write_comment(&mut self, comment: &FlatComment) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO comments \
             (id, article_id, user_id, comment_date, content, parent_id, discussion_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.id)
        .bind(&comment.article_id)
        .bind(comment.user_id)
        .bind(comment.date.format("%Y-%m-%d").to_string())
        .bind(&comment.content)
        .bind(comment.parent_id)
        .bind(comment.discussion_id)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Inserted),
            Err(e) => {
                let err = StoreError::new(format!("insert comment {}", comment.id), e);
                if err.is_duplicate() {
                    debug!(comment_id = comment.id, "duplicate comment, keeping stored row");
                    Ok(WriteOutcome::Duplicate)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Records `position`/`article_id` as the latest committed point of `run_key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the upsert fails.
    pub async fn save_checkpoint(
        &mut self,
        run_key: &str,
        position: usize,
        article_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO collection_checkpoints (run_key, position, article_id, updated_at) \
             VALUES (?, ?, ?, datetime('now')) \
             ON CONFLICT(run_key) DO UPDATE SET \
             position = excluded.position, \
             article_id = excluded.article_id, \
             updated_at = excluded.updated_at",
        )
        .bind(run_key)
        .bind(i64::try_from(position).unwrap_or(i64::MAX))
        .bind(article_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::new(format!("save checkpoint {run_key}"), e))?;
        Ok(())
    }

    /// Commits every write made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the commit fails; nothing is persisted then.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::new("commit", e))
    }

    /// Discards every write made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the rollback statement fails.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::new("rollback", e))
    }
}

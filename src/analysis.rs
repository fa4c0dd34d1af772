//! Negative-word scoring of stored text.
//!
//! The score of a text is the share of its alphabetic tokens that appear in
//! a fixed vocabulary. Scores are written to the `neg_words` column of
//! articles and comments that do not have one yet.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sqlx::Row;
use thiserror::Error;
use tracing::{info, instrument};

use crate::db::Database;
use crate::store::StoreError;

/// Errors from loading a vocabulary or scoring stored rows.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The vocabulary file could not be read.
    #[error("cannot read vocabulary {path}: {source}")]
    Vocabulary {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading or updating rows failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A set of lower-cased words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    words: HashSet<String>,
}

impl Vocabulary {
    /// Builds a vocabulary from a comma-separated word list.
    #[must_use]
    pub fn from_list(raw: &str) -> Self {
        Self {
            words: raw
                .split(',')
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Reads a comma-separated word list file.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Vocabulary`] if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AnalysisError::Vocabulary {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_list(&raw))
    }

    /// Returns `true` if `word` (already lower-cased) is in the vocabulary.
    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` when there are no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

const APOSTROPHES: [char; 2] = ['\'', '\u{2019}'];

/// Enclitics split off the word they follow ("it's", "they've").
const CLITICS: [&str; 6] = ["s", "m", "re", "ve", "ll", "d"];

/// The word part of a contraction: "don't" is "do", "it's" is "it".
///
/// Tokens with any other apostrophe come back whole.
fn strip_clitic(token: &str) -> &str {
    let Some(pos) = token.rfind(APOSTROPHES) else {
        return token;
    };
    let (head, tail) = token.split_at(pos);
    let Some(tail) = tail.strip_prefix(APOSTROPHES) else {
        return token;
    };

    if tail.eq_ignore_ascii_case("t") && head.len() > 1 && head.ends_with(['n', 'N']) {
        return &head[..head.len() - 1];
    }
    if CLITICS.iter().any(|c| tail.eq_ignore_ascii_case(c)) {
        return head;
    }
    token
}

/// Lower-cased alphabetic tokens of `text`; hyphens split words and
/// contractions keep their word part.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c == '-')
        .map(|t| strip_clitic(t.trim_matches(|c: char| !c.is_alphanumeric())))
        .filter(|t| !t.is_empty() && t.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
}

/// Share of alphabetic tokens in `text` found in `vocabulary`.
///
/// Returns `0.0` for text without alphabetic tokens.
///
/// ```
/// use harvester_core::analysis::{Vocabulary, negative_ratio};
///
/// let vocab = Vocabulary::from_list("loss,decline");
/// assert!((negative_ratio("Loss and decline, then growth.", &vocab) - 0.4).abs() < 1e-9);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn negative_ratio(text: &str, vocabulary: &Vocabulary) -> f64 {
    let (total, matched) = tokens(text).fold((0usize, 0usize), |(total, matched), token| {
        (total + 1, matched + usize::from(vocabulary.contains(&token)))
    });
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    }
}

/// Rows scored by [`score_unscored`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSummary {
    /// Articles that received a score.
    pub articles: usize,
    /// Comments that received a score.
    pub comments: usize,
}

/// Scores every article and comment whose `neg_words` is NULL.
///
/// Each table is updated in one transaction.
///
/// # Errors
///
/// Returns [`AnalysisError::Store`] if reading or updating fails.
#[instrument(skip_all, fields(vocabulary = vocabulary.len()))]
pub async fn score_unscored(
    db: &Database,
    vocabulary: &Vocabulary,
) -> Result<ScoreSummary, AnalysisError> {
    let articles = score_table(db, vocabulary, ScoredTable::Articles).await?;
    let comments = score_table(db, vocabulary, ScoredTable::Comments).await?;
    info!(articles, comments, "scoring complete");
    Ok(ScoreSummary { articles, comments })
}

#[derive(Clone, Copy)]
enum ScoredTable {
    Articles,
    Comments,
}

impl ScoredTable {
    fn select_sql(self) -> &'static str {
        match self {
            Self::Articles => "SELECT id, text AS body FROM articles WHERE neg_words IS NULL",
            Self::Comments => "SELECT CAST(id AS TEXT) AS id, content AS body FROM comments WHERE neg_words IS NULL",
        }
    }

    fn update_sql(self) -> &'static str {
        match self {
            Self::Articles => "UPDATE articles SET neg_words = ? WHERE id = ?",
            Self::Comments => "UPDATE comments SET neg_words = ? WHERE id = CAST(? AS INTEGER)",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Articles => "articles",
            Self::Comments => "comments",
        }
    }
}

async fn score_table(
    db: &Database,
    vocabulary: &Vocabulary,
    table: ScoredTable,
) -> Result<usize, AnalysisError> {
    let rows = sqlx::query(table.select_sql())
        .fetch_all(db.pool())
        .await
        .map_err(|e| StoreError::new(format!("read unscored {}", table.name()), e))?;

    let mut tx = db
        .pool()
        .begin()
        .await
        .map_err(|e| StoreError::new("begin transaction", e))?;
    for row in &rows {
        let id: String = row.get("id");
        let body: String = row.get("body");
        sqlx::query(table.update_sql())
            .bind(negative_ratio(&body, vocabulary))
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::new(format!("score {} {id}", table.name()), e))?;
    }
    tx.commit()
        .await
        .map_err(|e| StoreError::new("commit", e))?;

    Ok(rows.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_from_list_normalizes() {
        let vocab = Vocabulary::from_list(" Loss, DECLINE ,,weak\n");
        assert_eq!(vocab.len(), 3);
        assert!(vocab.contains("decline"));
        assert!(vocab.contains("weak"));
    }

    #[test]
    fn test_ratio_ignores_numbers_and_splits_hyphens() {
        let vocab = Vocabulary::from_list("bad");
        // shares fell on bad news bad quarter
        let ratio = negative_ratio("Shares fell 12% on bad-news; BAD quarter!", &vocab);
        assert!((ratio - 2.0 / 7.0).abs() < 1e-9, "ratio {ratio}");
    }

    #[test]
    fn test_contractions_keep_word_part() {
        assert_eq!(strip_clitic("don't"), "do");
        assert_eq!(strip_clitic("Can\u{2019}t"), "Ca");
        assert_eq!(strip_clitic("it's"), "it");
        assert_eq!(strip_clitic("we'll"), "we");
        assert_eq!(strip_clitic("o'clock"), "o'clock");

        let vocab = Vocabulary::from_list("do,loss");
        // i do think it a loss
        let ratio = negative_ratio("I don't think it's a loss.", &vocab);
        assert!((ratio - 2.0 / 6.0).abs() < 1e-9, "ratio {ratio}");
    }

    #[test]
    fn test_ratio_of_empty_text_is_zero() {
        let vocab = Vocabulary::from_list("bad");
        assert!(negative_ratio("", &vocab).abs() < f64::EPSILON);
        assert!(negative_ratio("123 456", &vocab).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Vocabulary::load(Path::new("/no/such/words.txt")).unwrap_err();
        assert!(matches!(err, AnalysisError::Vocabulary { .. }));
    }

    #[tokio::test]
    async fn test_score_unscored_fills_nulls_once() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO articles (id, ticker, published_date, title, text) \
             VALUES ('1', 'AAPL', '2017-01-01', 't', 'bad good'), \
                    ('2', 'AAPL', '2017-01-01', 't', 'good')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO comments (id, article_id, user_id, comment_date, content) \
             VALUES (5, '1', 1, '2017-01-02', 'bad bad')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let vocab = Vocabulary::from_list("bad");
        let summary = score_unscored(&db, &vocab).await.unwrap();
        assert_eq!(summary, ScoreSummary { articles: 2, comments: 1 });

        let (score,): (f64,) = sqlx::query_as("SELECT neg_words FROM articles WHERE id = '1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!((score - 0.5).abs() < 1e-9);
        let (score,): (f64,) = sqlx::query_as("SELECT neg_words FROM comments WHERE id = 5")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!((score - 1.0).abs() < 1e-9);

        let again = score_unscored(&db, &vocab).await.unwrap();
        assert_eq!(again, ScoreSummary::default());
    }
}

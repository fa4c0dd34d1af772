//! Error types for record persistence.

use std::fmt;

use thiserror::Error;

/// Classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Insert collided with an existing primary or unique key.
    UniqueViolation,
    /// Another constraint (check, not-null, foreign key) failed.
    ConstraintViolation,
    /// `SQLite` reported busy/locked.
    BusyOrLocked,
    /// Pool timed out or was closed.
    Pool,
    /// Filesystem or transport IO failure.
    Io,
    /// Anything else.
    Other,
}

impl StoreErrorKind {
    /// Classifies a `sqlx` error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Pool,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(db_error) => classify(db_error.as_ref()),
            _ => Self::Other,
        }
    }
}

fn classify(db_error: &(dyn sqlx::error::DatabaseError + 'static)) -> StoreErrorKind {
    if db_error.is_unique_violation() {
        return StoreErrorKind::UniqueViolation;
    }

    let code = db_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreErrorKind::BusyOrLocked;
    }

    if db_error.is_foreign_key_violation()
        || db_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreErrorKind::ConstraintViolation;
    }

    let message = db_error.message().to_ascii_lowercase();
    if message.contains("unique constraint failed") {
        return StoreErrorKind::UniqueViolation;
    }
    if message.contains("database is locked") || message.contains("database is busy") {
        return StoreErrorKind::BusyOrLocked;
    }

    StoreErrorKind::Other
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UniqueViolation => "unique_violation",
            Self::ConstraintViolation => "constraint_violation",
            Self::BusyOrLocked => "busy_or_locked",
            Self::Pool => "pool",
            Self::Io => "io",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// A failed store operation.
#[derive(Debug, Error)]
#[error("{operation} failed ({kind}): {source}")]
pub struct StoreError {
    /// What was being done, e.g. `"insert article 123"`.
    pub operation: String,
    /// Failure classification.
    pub kind: StoreErrorKind,
    /// Driver error.
    #[source]
    pub source: sqlx::Error,
}

impl StoreError {
    /// Wraps a driver error with the operation it interrupted.
    #[must_use]
    pub fn new(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self {
            operation: operation.into(),
            kind: StoreErrorKind::from_sqlx(&source),
            source,
        }
    }

    /// Returns `true` for a duplicate-key collision.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.kind == StoreErrorKind::UniqueViolation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_classified() {
        assert_eq!(
            StoreErrorKind::from_sqlx(&sqlx::Error::PoolTimedOut),
            StoreErrorKind::Pool
        );
        assert_eq!(
            StoreErrorKind::from_sqlx(&sqlx::Error::RowNotFound),
            StoreErrorKind::Other
        );
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(StoreErrorKind::UniqueViolation.to_string(), "unique_violation");
        assert_eq!(StoreErrorKind::BusyOrLocked.to_string(), "busy_or_locked");
    }

    #[test]
    fn test_error_message_carries_operation() {
        let err = StoreError::new("insert article 7", sqlx::Error::PoolClosed);
        assert!(!err.is_duplicate());
        assert!(err.to_string().starts_with("insert article 7 failed (pool)"));
    }
}

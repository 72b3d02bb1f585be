use chrono::{DateTime, Utc};
use thiserror::Error;

/// Contract violations rejected by the scheduler before any state is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("Quality {quality} is outside the accepted range {min}..={max}")]
    InvalidQuality { quality: i32, min: i32, max: i32 },

    #[error("Review at {now} precedes the last review at {last_reviewed_at}")]
    CausalityViolation {
        now: DateTime<Utc>,
        last_reviewed_at: DateTime<Utc>,
    },

    #[error("A due date {interval_days} days after {from} cannot be represented")]
    DueDateOutOfRange {
        from: DateTime<Utc>,
        interval_days: f64,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid scheduler config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("No review state for user '{user}' and flashcard {flashcard_id}")]
    StateNotFound { user: String, flashcard_id: i64 },

    #[error("Invalid review state for flashcard {flashcard_id}: {reason}")]
    InvalidSnapshot { flashcard_id: i64, reason: String },

    #[error("Timestamp {0} cannot be stored")]
    TimestampOutOfRange(DateTime<Utc>),

    #[error("No card left to grade in this session")]
    NoCurrentCard,

    #[error("Store connection lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

//! Review store backed by SQLite
//!
//! Persists per-card scheduling state keyed by `(user, flashcard)`, a log of
//! accepted reviews, and the due-card query used when a session starts.
//! Timestamps are stored as unix nanoseconds so every field round-trips
//! exactly.

use crate::error::{StoreError, StoreResult};
use crate::models::{ReviewState, ReviewTotals, Scheduler};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;

/// Opens (or creates) the database file and makes sure the tables exist.
pub fn init_database(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    create_tables(&conn)?;
    log::info!("Opened review store at {}", path.display());
    Ok(conn)
}

pub fn init_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

fn create_tables(conn: &Connection) -> StoreResult<()> {
    // Current scheduling state, one row per user and flashcard
    conn.execute(
        "CREATE TABLE IF NOT EXISTS review_states (
            user_id TEXT NOT NULL,
            flashcard_id INTEGER NOT NULL,
            repetitions INTEGER NOT NULL DEFAULT 0,
            interval_days REAL NOT NULL DEFAULT 0,
            ease_factor REAL NOT NULL,
            due_at INTEGER,
            last_reviewed_at INTEGER,
            PRIMARY KEY (user_id, flashcard_id)
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS review_states_due ON review_states (user_id, due_at)",
        (),
    )?;

    // Every accepted review, used for success-rate statistics
    conn.execute(
        "CREATE TABLE IF NOT EXISTS review_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            flashcard_id INTEGER NOT NULL,
            quality INTEGER NOT NULL,
            passed INTEGER NOT NULL,
            occurred_at INTEGER NOT NULL,
            interval_days REAL NOT NULL,
            ease_factor REAL NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn to_nanos(timestamp: DateTime<Utc>) -> StoreResult<i64> {
    timestamp
        .timestamp_nanos_opt()
        .ok_or(StoreError::TimestampOutOfRange(timestamp))
}

fn optional_nanos(timestamp: Option<DateTime<Utc>>) -> StoreResult<Option<i64>> {
    timestamp.map(to_nanos).transpose()
}

fn state_from_row(row: &Row, offset: usize) -> rusqlite::Result<ReviewState> {
    Ok(ReviewState {
        repetitions: row.get(offset)?,
        interval_days: row.get(offset + 1)?,
        ease_factor: row.get(offset + 2)?,
        due_at: row
            .get::<_, Option<i64>>(offset + 3)?
            .map(DateTime::from_timestamp_nanos),
        last_reviewed_at: row
            .get::<_, Option<i64>>(offset + 4)?
            .map(DateTime::from_timestamp_nanos),
    })
}

/// Loads the state of a flashcard, or `None` if it was never stored.
pub fn load_review_state(
    conn: &Connection,
    user: &str,
    flashcard_id: i64,
) -> StoreResult<Option<ReviewState>> {
    let state = conn
        .query_row(
            "SELECT repetitions, interval_days, ease_factor, due_at, last_reviewed_at
             FROM review_states WHERE user_id = ?1 AND flashcard_id = ?2",
            params![user, flashcard_id],
            |row| state_from_row(row, 0),
        )
        .optional()?;
    Ok(state)
}

/// Returns the stored state, creating a never-reviewed one first if needed.
pub fn ensure_review_state(
    conn: &Connection,
    scheduler: &Scheduler,
    user: &str,
    flashcard_id: i64,
) -> StoreResult<ReviewState> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO review_states (user_id, flashcard_id, ease_factor)
         VALUES (?1, ?2, ?3)",
        params![user, flashcard_id, scheduler.config().initial_ease],
    )?;
    if inserted > 0 {
        log::debug!("Created review state for user '{user}' flashcard {flashcard_id}");
    }

    load_review_state(conn, user, flashcard_id)?.ok_or_else(|| StoreError::StateNotFound {
        user: user.to_string(),
        flashcard_id,
    })
}

/// Inserts or replaces the state of a flashcard
pub fn save_review_state(
    conn: &Connection,
    user: &str,
    flashcard_id: i64,
    state: &ReviewState,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO review_states
            (user_id, flashcard_id, repetitions, interval_days, ease_factor,
             due_at, last_reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (user_id, flashcard_id) DO UPDATE SET
            repetitions = excluded.repetitions,
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            due_at = excluded.due_at,
            last_reviewed_at = excluded.last_reviewed_at",
        params![
            user,
            flashcard_id,
            state.repetitions,
            state.interval_days,
            state.ease_factor,
            optional_nanos(state.due_at)?,
            optional_nanos(state.last_reviewed_at)?,
        ],
    )?;
    Ok(())
}

/// Removes a flashcard's state and review history together. Returns whether
/// a state existed.
pub fn delete_review_state(conn: &Connection, user: &str, flashcard_id: i64) -> StoreResult<bool> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        "DELETE FROM review_states WHERE user_id = ?1 AND flashcard_id = ?2",
        params![user, flashcard_id],
    )?;
    tx.execute(
        "DELETE FROM review_log WHERE user_id = ?1 AND flashcard_id = ?2",
        params![user, flashcard_id],
    )?;
    tx.commit()?;
    Ok(removed > 0)
}

/// Records one review: load, schedule and save inside a single write
/// transaction, so two reviews of the same card cannot interleave.
///
/// A card without stored state is treated as never reviewed. When the
/// scheduler rejects the input nothing is written.
pub fn record_review(
    conn: &mut Connection,
    scheduler: &Scheduler,
    user: &str,
    flashcard_id: i64,
    quality: i32,
    now: DateTime<Utc>,
) -> StoreResult<ReviewState> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current =
        load_review_state(&tx, user, flashcard_id)?.unwrap_or_else(|| scheduler.new_state());

    let next = scheduler.schedule(&current, quality, now).map_err(|err| {
        log::error!("Rejected review of flashcard {flashcard_id} for user '{user}': {err}");
        err
    })?;

    save_review_state(&tx, user, flashcard_id, &next)?;
    tx.execute(
        "INSERT INTO review_log
            (user_id, flashcard_id, quality, passed, occurred_at, interval_days, ease_factor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user,
            flashcard_id,
            quality,
            scheduler.is_passing(quality),
            to_nanos(now)?,
            next.interval_days,
            next.ease_factor,
        ],
    )?;
    tx.commit()?;

    log::info!(
        "Flashcard {flashcard_id} for user '{user}' reviewed with quality {quality}, \
         next interval {} days",
        next.interval_days
    );
    Ok(next)
}

/// All stored states of a user, ordered by flashcard id
pub fn list_review_states(
    conn: &Connection,
    user: &str,
) -> StoreResult<Vec<(i64, ReviewState)>> {
    let mut stmt = conn.prepare(
        "SELECT flashcard_id, repetitions, interval_days, ease_factor, due_at, last_reviewed_at
         FROM review_states WHERE user_id = ?1
         ORDER BY flashcard_id ASC",
    )?;

    let states = stmt
        .query_map(params![user], |row| Ok((row.get(0)?, state_from_row(row, 1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(states)
}

/// States due at `now`: never reviewed first, then oldest due date first.
pub fn due_review_states(
    conn: &Connection,
    user: &str,
    now: DateTime<Utc>,
    limit: Option<usize>,
) -> StoreResult<Vec<(i64, ReviewState)>> {
    // SQLite treats a negative limit as unbounded
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare(
        "SELECT flashcard_id, repetitions, interval_days, ease_factor, due_at, last_reviewed_at
         FROM review_states
         WHERE user_id = ?1 AND (due_at IS NULL OR due_at <= ?2)
         ORDER BY due_at IS NOT NULL, due_at ASC, flashcard_id ASC
         LIMIT ?3",
    )?;

    let states = stmt
        .query_map(params![user, to_nanos(now)?, limit], |row| {
            Ok((row.get(0)?, state_from_row(row, 1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(states)
}

/// Number of recorded reviews and how many of them passed
pub fn review_totals(conn: &Connection, user: &str) -> StoreResult<ReviewTotals> {
    let (reviews, passed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(passed), 0) FROM review_log WHERE user_id = ?1",
        params![user],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(ReviewTotals {
        reviews: reviews.max(0) as u64,
        passed: passed.max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_ensure_creates_default_state() {
        let conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();

        let state = ensure_review_state(&conn, &scheduler, "ana", 1).unwrap();
        assert_eq!(state, ReviewState::new());

        // second call leaves the row alone
        let again = ensure_review_state(&conn, &scheduler, "ana", 1).unwrap();
        assert_eq!(again, state);
    }

    #[test]
    fn test_save_and_load_is_lossless() {
        let conn = init_in_memory().unwrap();
        let reviewed_at = Utc.timestamp_opt(1_715_342_400, 123_456_789).unwrap();
        let state = ReviewState {
            repetitions: 4,
            interval_days: 37.0,
            ease_factor: 2.3500000000000005,
            due_at: Some(reviewed_at + Duration::days(37)),
            last_reviewed_at: Some(reviewed_at),
        };

        save_review_state(&conn, "ana", 7, &state).unwrap();
        let loaded = load_review_state(&conn, "ana", 7).unwrap();
        assert_eq!(loaded, Some(state));
    }

    #[test]
    fn test_load_missing_state() {
        let conn = init_in_memory().unwrap();
        assert_eq!(load_review_state(&conn, "ana", 99).unwrap(), None);
    }

    #[test]
    fn test_record_review_persists_new_state() {
        let mut conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();

        let first = record_review(&mut conn, &scheduler, "ana", 3, 4, t0()).unwrap();
        assert_eq!(first.repetitions, 1);
        assert_eq!(first.due_at, Some(t0() + Duration::days(1)));

        let second =
            record_review(&mut conn, &scheduler, "ana", 3, 4, t0() + Duration::days(1)).unwrap();
        assert_eq!(second.interval_days, 6.0);

        let stored = load_review_state(&conn, "ana", 3).unwrap();
        assert_eq!(stored, Some(second));
    }

    #[test]
    fn test_rejected_review_writes_nothing() {
        let mut conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();

        let before = record_review(&mut conn, &scheduler, "ana", 3, 4, t0()).unwrap();

        let invalid = record_review(&mut conn, &scheduler, "ana", 3, 9, t0() + Duration::days(1));
        assert!(matches!(invalid, Err(StoreError::Schedule(_))));

        let out_of_order =
            record_review(&mut conn, &scheduler, "ana", 3, 4, t0() - Duration::days(1));
        assert!(matches!(out_of_order, Err(StoreError::Schedule(_))));

        assert_eq!(load_review_state(&conn, "ana", 3).unwrap(), Some(before));
        assert_eq!(review_totals(&conn, "ana").unwrap().reviews, 1);
    }

    #[test]
    fn test_due_review_states() {
        let mut conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();

        // 1: never reviewed, 2: due tomorrow, 3: lapsed a week ago and overdue
        ensure_review_state(&conn, &scheduler, "ana", 1).unwrap();
        record_review(&mut conn, &scheduler, "ana", 2, 4, t0()).unwrap();
        record_review(&mut conn, &scheduler, "ana", 3, 1, t0() - Duration::days(7)).unwrap();
        // other users never leak in
        ensure_review_state(&conn, &scheduler, "ben", 4).unwrap();

        let due = due_review_states(&conn, "ana", t0(), None).unwrap();
        let ids: Vec<i64> = due.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);

        let later = due_review_states(&conn, "ana", t0() + Duration::days(1), None).unwrap();
        assert_eq!(later.len(), 3);

        let limited = due_review_states(&conn, "ana", t0(), Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].0, 1);
    }

    #[test]
    fn test_delete_review_state() {
        let mut conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();
        record_review(&mut conn, &scheduler, "ana", 5, 4, t0()).unwrap();

        assert!(delete_review_state(&conn, "ana", 5).unwrap());
        assert!(!delete_review_state(&conn, "ana", 5).unwrap());
        assert_eq!(load_review_state(&conn, "ana", 5).unwrap(), None);
        assert_eq!(review_totals(&conn, "ana").unwrap().reviews, 0);
    }

    #[test]
    fn test_failed_delete_keeps_state_and_history() {
        let mut conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();
        let state = record_review(&mut conn, &scheduler, "ana", 5, 4, t0()).unwrap();

        conn.execute_batch(
            "CREATE TRIGGER review_log_locked BEFORE DELETE ON review_log
             BEGIN SELECT RAISE(ABORT, 'log locked'); END;",
        )
        .unwrap();

        assert!(delete_review_state(&conn, "ana", 5).is_err());
        assert_eq!(load_review_state(&conn, "ana", 5).unwrap(), Some(state));
        assert_eq!(review_totals(&conn, "ana").unwrap().reviews, 1);
    }

    #[test]
    fn test_review_waits_for_other_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.sqlite3");
        let scheduler = Scheduler::default();

        let mut first = init_database(&path).unwrap();
        let mut second = init_database(&path).unwrap();
        second.busy_timeout(std::time::Duration::ZERO).unwrap();

        {
            // another writer holds the lock, so the review cannot load a stale state
            let _lock = first
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .unwrap();
            let blocked = record_review(&mut second, &scheduler, "ana", 1, 4, t0());
            assert!(
                matches!(
                    &blocked,
                    Err(StoreError::Database(rusqlite::Error::SqliteFailure(e, _)))
                        if e.code == rusqlite::ErrorCode::DatabaseBusy
                ),
                "{blocked:?}"
            );
        }

        record_review(&mut first, &scheduler, "ana", 1, 4, t0()).unwrap();
        let after_both =
            record_review(&mut second, &scheduler, "ana", 1, 4, t0() + Duration::days(1)).unwrap();
        assert_eq!(after_both.repetitions, 2);
        assert_eq!(after_both.interval_days, 6.0);

        let stored = load_review_state(&first, "ana", 1).unwrap().unwrap();
        assert_eq!(stored, after_both);
        assert_eq!(review_totals(&first, "ana").unwrap().reviews, 2);
    }

    #[test]
    fn test_concurrent_reviews_are_not_lost() {
        const REVIEWS_PER_THREAD: u32 = 10;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.sqlite3");
        init_database(&path).unwrap();

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut conn = init_database(&path).unwrap();
                    conn.busy_timeout(std::time::Duration::from_secs(5)).unwrap();
                    let scheduler = Scheduler::default();
                    for _ in 0..REVIEWS_PER_THREAD {
                        record_review(&mut conn, &scheduler, "ana", 1, 4, t0()).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let conn = init_database(&path).unwrap();
        let stored = load_review_state(&conn, "ana", 1).unwrap().unwrap();
        assert_eq!(stored.repetitions, 2 * REVIEWS_PER_THREAD);
        assert_eq!(
            review_totals(&conn, "ana").unwrap(),
            ReviewTotals {
                reviews: u64::from(2 * REVIEWS_PER_THREAD),
                passed: u64::from(2 * REVIEWS_PER_THREAD),
            }
        );
    }

    #[test]
    fn test_review_totals() {
        let mut conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();

        assert_eq!(review_totals(&conn, "ana").unwrap(), ReviewTotals::default());

        record_review(&mut conn, &scheduler, "ana", 1, 5, t0()).unwrap();
        record_review(&mut conn, &scheduler, "ana", 2, 0, t0()).unwrap();
        record_review(&mut conn, &scheduler, "ana", 2, 3, t0() + Duration::days(1)).unwrap();

        let totals = review_totals(&conn, "ana").unwrap();
        assert_eq!(totals, ReviewTotals { reviews: 3, passed: 2 });
    }

    #[test]
    fn test_list_review_states() {
        let conn = init_in_memory().unwrap();
        let scheduler = Scheduler::default();
        ensure_review_state(&conn, &scheduler, "ana", 9).unwrap();
        ensure_review_state(&conn, &scheduler, "ana", 2).unwrap();

        let ids: Vec<i64> = list_review_states(&conn, "ana")
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[test]
    fn test_init_database_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.sqlite3");

        {
            let conn = init_database(&path).unwrap();
            save_review_state(&conn, "ana", 1, &ReviewState::new()).unwrap();
        }

        let conn = init_database(&path).unwrap();
        assert_eq!(load_review_state(&conn, "ana", 1).unwrap(), Some(ReviewState::new()));
    }
}

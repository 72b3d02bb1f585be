//! Per-card scheduling state as the store keeps it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ease every card starts from before its first review.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Scheduling state of one flashcard.
///
/// The new/learning/reviewing/relearning stages are not tagged explicitly;
/// they follow from `repetitions`, `interval_days` and `last_reviewed_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    /// Consecutive passing reviews since the last lapse.
    pub repetitions: u32,
    /// Current spacing in days; 0 means never scheduled.
    pub interval_days: f64,
    pub ease_factor: f64,
    /// `None` only before the first review.
    pub due_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewState {
    /// State of a card that has never been reviewed.
    pub fn new() -> Self {
        Self::with_ease(DEFAULT_EASE_FACTOR)
    }

    pub fn with_ease(ease_factor: f64) -> Self {
        Self {
            repetitions: 0,
            interval_days: 0.0,
            ease_factor,
            due_at: None,
            last_reviewed_at: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }

    /// Never-reviewed cards are always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.due_at {
            Some(due_at) => due_at <= now,
            None => true,
        }
    }
}

impl Default for ReviewState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_new_state_is_due() {
        let state = ReviewState::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        assert!(state.is_new());
        assert!(state.is_due(now));
        assert_eq!(state.repetitions, 0);
        assert_eq!(state.interval_days, 0.0);
        assert_eq!(state.ease_factor, DEFAULT_EASE_FACTOR);
    }

    #[test]
    fn test_future_due_date_is_not_due() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let state = ReviewState {
            repetitions: 1,
            interval_days: 1.0,
            ease_factor: 2.5,
            due_at: Some(now + Duration::days(1)),
            last_reviewed_at: Some(now),
        };

        assert!(!state.is_due(now));
        assert!(state.is_due(now + Duration::days(1)));
    }
}

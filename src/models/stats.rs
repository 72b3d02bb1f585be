//! Study statistics derived from stored scheduling state.
use super::ReviewState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review counts taken from the review log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTotals {
    pub reviews: u64,
    pub passed: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyStats {
    pub total_cards: usize,
    pub due_cards: usize,
    pub reviewed_cards: usize,
    /// Cards whose interval reached the mastery threshold.
    pub mastered_cards: usize,
    /// Percentage of all cards that are mastered.
    pub mastery_rate: f64,
    /// Percentage of recorded reviews that passed.
    pub avg_success_rate: f64,
}

impl StudyStats {
    pub fn from_states<'a, I>(
        states: I,
        now: DateTime<Utc>,
        mastery_interval_days: f64,
        totals: ReviewTotals,
    ) -> Self
    where
        I: IntoIterator<Item = &'a ReviewState>,
    {
        let mut stats = StudyStats::default();
        for state in states {
            stats.total_cards += 1;
            if state.is_due(now) {
                stats.due_cards += 1;
            }
            if !state.is_new() {
                stats.reviewed_cards += 1;
            }
            if state.interval_days >= mastery_interval_days {
                stats.mastered_cards += 1;
            }
        }

        stats.mastery_rate = percentage(stats.mastered_cards as u64, stats.total_cards as u64);
        stats.avg_success_rate = percentage(totals.passed, totals.reviews);
        stats
    }
}

/// Percentage rounded to two decimals, 0 for an empty total.
fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

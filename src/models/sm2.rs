//! SM-2 (SuperMemo 2) family spaced repetition scheduler.
//!
//! Given a card's current [`ReviewState`], a quality grade and the review
//! instant, computes the card's next state:
//! - Quality at or above the passing threshold is a recall: the repetition
//!   streak grows and the interval goes 1 day → 6 days → previous × EF
//! - Quality below the threshold is a lapse: the streak resets and the card
//!   comes back after the lapse floor interval
//! - EF moves in proportion to the distance from the threshold and stays
//!   within `[min_ease, max_ease]`
//! - Intervals are clamped to `[lapse_interval_days, max_interval_days]`
//!
//! The scheduler holds nothing but its policy constants, so it can be shared
//! freely between request handlers.

use super::{AnswerButton, ReviewState};
use crate::config::SchedulerConfig;
use crate::error::{ConfigError, ScheduleError};
use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Builds a scheduler over a validated policy.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// State for a card that has never been reviewed.
    pub fn new_state(&self) -> ReviewState {
        ReviewState::with_ease(self.config.initial_ease)
    }

    pub fn is_passing(&self, quality: i32) -> bool {
        quality >= self.config.passing_quality
    }

    pub fn validate_quality(&self, quality: i32) -> Result<(), ScheduleError> {
        if quality < self.config.min_quality || quality > self.config.max_quality {
            return Err(ScheduleError::InvalidQuality {
                quality,
                min: self.config.min_quality,
                max: self.config.max_quality,
            });
        }
        Ok(())
    }

    /// Computes the state after reviewing a card with `quality` at `now`.
    ///
    /// Fails without producing anything when `quality` is out of range,
    /// `now` precedes the previous review, or the due date cannot be represented.
    pub fn schedule(
        &self,
        state: &ReviewState,
        quality: i32,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, ScheduleError> {
        self.validate_quality(quality)?;
        if let Some(last_reviewed_at) = state.last_reviewed_at {
            if now < last_reviewed_at {
                return Err(ScheduleError::CausalityViolation {
                    now,
                    last_reviewed_at,
                });
            }
        }

        let cfg = &self.config;
        let previous_interval = state.interval_days.max(0.0);

        let (repetitions, ease_factor, interval) = if self.is_passing(quality) {
            let repetitions = state.repetitions.saturating_add(1);
            let steps = f64::from(quality - cfg.passing_quality);
            let ease_factor =
                self.clamp_ease(state.ease_factor + cfg.ease_bonus_per_step * steps);

            let interval = match repetitions {
                1 => cfg.first_interval_days.max(previous_interval),
                2 => cfg.second_interval_days.max(previous_interval),
                _ => (previous_interval * ease_factor)
                    .round()
                    .max(previous_interval + 1.0),
            };
            (repetitions, ease_factor, interval)
        } else {
            let steps = f64::from(cfg.passing_quality - quality);
            let ease_factor =
                self.clamp_ease(state.ease_factor - cfg.ease_penalty_per_step * steps);
            (0, ease_factor, cfg.lapse_interval_days)
        };

        let interval_days = interval.clamp(cfg.lapse_interval_days, cfg.max_interval_days);
        let due_at = due_after(now, interval_days)?;

        log::debug!(
            "quality {quality}: repetitions {} -> {repetitions}, interval {} -> {interval_days}, \
             ease {:.2} -> {ease_factor:.2}",
            state.repetitions,
            state.interval_days,
            state.ease_factor,
        );

        Ok(ReviewState {
            repetitions,
            interval_days,
            ease_factor,
            due_at: Some(due_at),
            last_reviewed_at: Some(now),
        })
    }

    /// Checks that `state` is one this scheduler could have produced:
    /// ease within bounds, a never-reviewed card without interval or streak,
    /// and a reviewed card due exactly one interval after its last review.
    pub fn check_state(&self, state: &ReviewState) -> Result<(), String> {
        let cfg = &self.config;
        if !(cfg.min_ease..=cfg.max_ease).contains(&state.ease_factor) {
            return Err(format!(
                "ease factor {} outside {}..={}",
                state.ease_factor, cfg.min_ease, cfg.max_ease
            ));
        }

        match (state.due_at, state.last_reviewed_at) {
            (None, None) => {
                if state.interval_days != 0.0 || state.repetitions != 0 {
                    return Err("never-reviewed card has an interval or streak".to_string());
                }
            }
            (Some(due_at), Some(last_reviewed_at)) => {
                let interval = state.interval_days;
                if !(cfg.lapse_interval_days..=cfg.max_interval_days).contains(&interval) {
                    return Err(format!(
                        "interval {interval} outside {}..={}",
                        cfg.lapse_interval_days, cfg.max_interval_days
                    ));
                }
                if due_after(last_reviewed_at, interval).ok() != Some(due_at) {
                    return Err(format!(
                        "due date {due_at} is not {interval} days after {last_reviewed_at}"
                    ));
                }
            }
            _ => {
                return Err("due_at and last_reviewed_at must be set together".to_string());
            }
        }
        Ok(())
    }

    /// Interval each answer button would give, without touching `state`.
    pub fn preview(
        &self,
        state: &ReviewState,
        now: DateTime<Utc>,
    ) -> Result<Vec<(AnswerButton, f64)>, ScheduleError> {
        AnswerButton::ALL
            .iter()
            .map(|&button| {
                self.schedule(state, button.quality(), now)
                    .map(|next| (button, next.interval_days))
            })
            .collect()
    }

    fn clamp_ease(&self, ease_factor: f64) -> f64 {
        ease_factor.clamp(self.config.min_ease, self.config.max_ease)
    }
}

/// Schedules with the default policy.
pub fn schedule(
    state: &ReviewState,
    quality: i32,
    now: DateTime<Utc>,
) -> Result<ReviewState, ScheduleError> {
    Scheduler::default().schedule(state, quality, now)
}

/// `None` when the span does not fit a millisecond duration.
pub fn days_to_duration(days: f64) -> Option<Duration> {
    let millis = (days * MILLIS_PER_DAY).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

/// The instant `interval_days` after `from`.
pub fn due_after(
    from: DateTime<Utc>,
    interval_days: f64,
) -> Result<DateTime<Utc>, ScheduleError> {
    days_to_duration(interval_days)
        .and_then(|span| from.checked_add_signed(span))
        .ok_or(ScheduleError::DueDateOutOfRange {
            from,
            interval_days,
        })
}

/// Short label for an interval, e.g. "6d", "2w", "3mo".
pub fn format_interval(days: f64) -> String {
    let days = days.round() as i64;
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{days}d")
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

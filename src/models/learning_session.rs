//! Review session over the cards that are due.
//! Handles multi-round review, persisting every grade through the review store.

use super::{LearningCard, ReviewState, Scheduler};
use crate::database::db;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Order in which due cards are presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrder {
    /// Never-reviewed cards, then oldest due date first.
    #[default]
    DueFirst,
    /// Hardest cards (lowest ease) first.
    Adaptive,
    Shuffled,
}

/// Manages a session with multiple review rounds.
/// Cards that lapse are repeated in subsequent rounds.
pub struct LearningSession {
    pub user: String,
    pub all_cards: Vec<LearningCard>,
    pub current_round_cards: Vec<usize>,
    pub current_index: usize,
    pub round_number: usize,
    conn: Arc<Mutex<Connection>>,
    scheduler: Arc<Scheduler>,
}

impl LearningSession {
    /// Starts a session from the user's cards due at `now`.
    pub fn start(
        user: &str,
        conn: Arc<Mutex<Connection>>,
        scheduler: Arc<Scheduler>,
        now: DateTime<Utc>,
        limit: Option<usize>,
        order: SessionOrder,
    ) -> StoreResult<Self> {
        let cards = {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            db::due_review_states(&guard, user, now, limit)?
        };
        log::info!("Starting session for user '{user}' with {} due cards", cards.len());
        Ok(Self::new_from_due_cards(user.to_string(), cards, order, conn, scheduler))
    }

    pub fn new_from_due_cards(
        user: String,
        cards: Vec<(i64, ReviewState)>,
        order: SessionOrder,
        conn: Arc<Mutex<Connection>>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        let mut all_cards: Vec<_> = cards
            .into_iter()
            .map(|(id, state)| LearningCard::new(id, state))
            .collect();

        match order {
            // store already returns due order
            SessionOrder::DueFirst => {}
            SessionOrder::Adaptive => all_cards.sort_by(|a, b| {
                a.state
                    .ease_factor
                    .total_cmp(&b.state.ease_factor)
                    .then_with(|| a.state.due_at.cmp(&b.state.due_at))
            }),
            SessionOrder::Shuffled => all_cards.shuffle(&mut rand::rng()),
        }

        let indices: Vec<usize> = (0..all_cards.len()).collect();

        Self {
            user,
            all_cards,
            current_round_cards: indices,
            current_index: 0,
            round_number: 1,
            conn,
            scheduler,
        }
    }

    pub fn current_card(&self) -> Option<&LearningCard> {
        self.current_round_cards
            .get(self.current_index)
            .and_then(|&idx| self.all_cards.get(idx))
    }

    pub fn next_card(&mut self) {
        if self.current_index + 1 < self.current_round_cards.len() {
            self.current_index += 1;
        } else {
            self.start_next_round();
        }
    }

    /// Starts a new round with the cards that lapsed.
    /// If none did, the session is complete.
    fn start_next_round(&mut self) {
        let failed_indices: Vec<usize> = self
            .current_round_cards
            .iter()
            .copied()
            .filter(|&idx| self.all_cards.get(idx).is_some_and(|card| !card.is_learned))
            .collect();

        if !failed_indices.is_empty() {
            self.current_round_cards = failed_indices;
            self.current_index = 0;
            self.round_number += 1;
            log::debug!(
                "Round {} for user '{}' with {} cards",
                self.round_number,
                self.user,
                self.current_round_cards.len()
            );
        }
    }

    /// Grades the current card and persists its new scheduling state.
    /// Passing grades mark the card as learned for this round.
    pub fn grade_current_card(
        &mut self,
        quality: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<ReviewState> {
        let Some(&idx) = self.current_round_cards.get(self.current_index) else {
            return Err(StoreError::NoCurrentCard);
        };
        let flashcard_id = self.all_cards[idx].flashcard_id;

        let new_state = {
            let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            db::record_review(&mut conn, &self.scheduler, &self.user, flashcard_id, quality, now)?
        };

        let card = &mut self.all_cards[idx];
        card.is_learned = self.scheduler.is_passing(quality);
        card.state = new_state.clone();
        Ok(new_state)
    }

    pub fn learned_count(&self) -> usize {
        self.current_round_cards
            .iter()
            .filter(|&&idx| self.all_cards.get(idx).is_some_and(|card| card.is_learned))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.current_round_cards.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.learned_count()
    }

    /// True when the round is empty or every card in it passed.
    pub fn is_completed(&self) -> bool {
        self.current_round_cards.is_empty() || self.learned_count() == self.total_count()
    }

    pub fn phase_message(&self) -> String {
        if self.round_number == 1 {
            format!("Round {}: {} cards", self.round_number, self.total_count())
        } else {
            format!(
                "Round {} (Review): {} cards to retry",
                self.round_number,
                self.total_count()
            )
        }
    }
}

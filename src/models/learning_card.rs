//! Wrapper for a due card that tracks progress within one session.
use super::ReviewState;

#[derive(Clone, Debug)]
pub struct LearningCard {
    pub flashcard_id: i64,
    pub state: ReviewState,
    /// Passed in the current round.
    pub is_learned: bool,
}

impl LearningCard {
    pub fn new(flashcard_id: i64, state: ReviewState) -> Self {
        Self {
            flashcard_id,
            state,
            is_learned: false,
        }
    }
}

pub mod learning_card;
pub mod learning_session;
pub mod rating;
pub mod review_data;
pub mod sm2;
pub mod stats;

pub use learning_card::LearningCard;
pub use learning_session::{LearningSession, SessionOrder};
pub use rating::AnswerButton;
pub use review_data::{DEFAULT_EASE_FACTOR, ReviewState};
pub use sm2::Scheduler;
pub use stats::{ReviewTotals, StudyStats};

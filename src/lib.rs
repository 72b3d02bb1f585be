pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;

pub use config::SchedulerConfig;
pub use error::{ConfigError, ScheduleError, StoreError};
pub use models::{AnswerButton, LearningSession, ReviewState, Scheduler, SessionOrder, StudyStats};

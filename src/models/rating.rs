//! Answer buttons shown on the study screen and the quality each one records.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three buttons of the study screen.
///
/// Each maps onto a point of the full 0-5 quality scale so the scheduler
/// keeps its resolution when finer-grained input is added later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerButton {
    /// Review soon.
    Hard,
    /// Review later.
    Medium,
    /// Review much later.
    Easy,
}

impl AnswerButton {
    pub const ALL: [AnswerButton; 3] =
        [AnswerButton::Hard, AnswerButton::Medium, AnswerButton::Easy];

    pub fn quality(self) -> i32 {
        match self {
            AnswerButton::Hard => 1,
            AnswerButton::Medium => 3,
            AnswerButton::Easy => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnswerButton::Hard => "Hard",
            AnswerButton::Medium => "Medium",
            AnswerButton::Easy => "Easy",
        }
    }
}

impl fmt::Display for AnswerButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnswerButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hard" => Ok(AnswerButton::Hard),
            "medium" => Ok(AnswerButton::Medium),
            "easy" => Ok(AnswerButton::Easy),
            other => Err(format!("unknown answer button '{other}'")),
        }
    }
}

/// Parses either a button name or a raw numeric quality.
/// Range checking is left to the scheduler.
pub fn parse_quality(input: &str) -> Result<i32, String> {
    if let Ok(q) = input.trim().parse::<i32>() {
        return Ok(q);
    }
    input.trim().parse::<AnswerButton>().map(AnswerButton::quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_map_low_mid_high() {
        assert_eq!(AnswerButton::Hard.quality(), 1);
        assert_eq!(AnswerButton::Medium.quality(), 3);
        assert_eq!(AnswerButton::Easy.quality(), 5);
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality("4"), Ok(4));
        assert_eq!(parse_quality("easy"), Ok(5));
        assert_eq!(parse_quality("Hard"), Ok(1));
        // out of range numbers pass through untouched
        assert_eq!(parse_quality("9"), Ok(9));
        assert!(parse_quality("sometimes").is_err());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(SessionId);
id_newtype!(SessionImageId);
id_newtype!(ImageId);

/// Images across every tier of a run; denominator of the overall progress ring.
pub const TOTAL_IMAGES: u32 = 5;

/// Longest prompt the player may enter for a single image, in characters.
pub const MAX_PROMPT_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Easy,
    Medium,
    Hard,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Easy, Stage::Medium, Stage::Hard];

    pub fn image_count(self) -> usize {
        match self {
            Stage::Easy => 1,
            Stage::Medium | Stage::Hard => 2,
        }
    }

    pub fn pass_threshold(self) -> f64 {
        match self {
            Stage::Easy => 70.0,
            Stage::Medium => 75.0,
            Stage::Hard => 85.0,
        }
    }

    /// Inclusive: a score equal to the threshold passes.
    pub fn passes(self, score: f64) -> bool {
        score >= self.pass_threshold()
    }

    pub fn next(self) -> NextStage {
        match self {
            Stage::Easy => NextStage::Medium,
            Stage::Medium => NextStage::Hard,
            Stage::Hard => NextStage::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Easy => "easy",
            Stage::Medium => "medium",
            Stage::Hard => "hard",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Easy => "Easy",
            Stage::Medium => "Medium",
            Stage::Hard => "Hard",
        }
    }

    pub fn cleared_message(self) -> &'static str {
        match self {
            Stage::Easy => "Great job! Ready for Medium...",
            Stage::Medium => "Awesome! Ready for Hard...",
            Stage::Hard => "You did it!",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the server sends the player after a passed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStage {
    Medium,
    Hard,
    Done,
}

impl NextStage {
    pub fn stage(self) -> Option<Stage> {
        match self {
            NextStage::Medium => Some(Stage::Medium),
            NextStage::Hard => Some(Stage::Hard),
            NextStage::Done => None,
        }
    }

    pub fn is_done(self) -> bool {
        self == NextStage::Done
    }
}

impl fmt::Display for NextStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage() {
            Some(stage) => f.write_str(stage.as_str()),
            None => f.write_str("done"),
        }
    }
}

/// Stage pointer as reported by the status endpoint, which also knows `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePointer {
    Easy,
    Medium,
    Hard,
    Done,
}

impl StagePointer {
    pub fn stage(self) -> Option<Stage> {
        match self {
            StagePointer::Easy => Some(Stage::Easy),
            StagePointer::Medium => Some(Stage::Medium),
            StagePointer::Hard => Some(Stage::Hard),
            StagePointer::Done => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Eliminated,
    Completed,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Eliminated | LifecycleState::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Eliminated => "eliminated",
            LifecycleState::Completed => "completed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

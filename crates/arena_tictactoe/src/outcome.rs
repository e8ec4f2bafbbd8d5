//! Evaluation results for a board.

use super::{Mark, Position};
use serde::{Deserialize, Serialize};

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No line completed and at least one empty square remains.
    InProgress,
    /// `mark` completed `line`.
    Win {
        /// The winning mark.
        mark: Mark,
        /// The completed row, column or diagonal, in scan order.
        line: [Position; 3],
    },
    /// Board full with no completed line.
    Draw,
}

impl Outcome {
    /// Returns true once the game cannot continue.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }

    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Win { mark, .. } => Some(*mark),
            _ => None,
        }
    }

    /// Returns the winning line if there is one.
    pub fn line(&self) -> Option<[Position; 3]> {
        match self {
            Outcome::Win { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Returns true if the game was a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::InProgress => write!(f, "In progress"),
            Outcome::Win { mark, line } => write!(
                f,
                "Player {} wins ({}, {}, {})",
                mark,
                line[0].to_index(),
                line[1].to_index(),
                line[2].to_index()
            ),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

//! Pure tic-tac-toe logic: board types, outcome evaluation and engine move
//! selection.
//!
//! Everything here is synchronous and free of I/O. The session layer in
//! `arena_games` drives these functions from its coordinator.
//!
//! # Example
//!
//! ```
//! use arena_tictactoe::{evaluate, select_move, Board, Difficulty, Mark, Outcome};
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let board: Board = "XX. OO. X..".parse().unwrap();
//! let mut rng = StdRng::seed_from_u64(1);
//! let pos = select_move(&board, Mark::O, Difficulty::Exacting, &mut rng).unwrap();
//! assert_eq!(pos.to_index(), 5);
//! assert_eq!(evaluate(&board), Outcome::InProgress);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod engine;
mod game;
mod outcome;
mod position;
pub mod rules;
mod types;

pub use action::{Move, MoveError};
pub use engine::{
    BALANCED_RANDOM_PROBABILITY, Difficulty, Strategy, best_moves, select_move, select_move_with,
};
pub use game::{Game, STARTING_MARK};
pub use outcome::Outcome;
pub use position::Position;
pub use rules::evaluate;
pub use types::{Board, Mark, ParseBoardError, Square};

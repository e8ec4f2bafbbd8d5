//! Move selection for the engine-controlled mark.
//!
//! Three difficulty tiers share two strategies: a uniform random pick among
//! empty squares, and a full-depth minimax search. [`Difficulty::strategy`]
//! resolves a tier to a strategy using the caller's random source, which
//! keeps every branch reachable from a seeded generator in tests.

use super::rules::winning_line;
use super::{Board, Mark, Position, Square};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Probability that [`Difficulty::Balanced`] plays a random move instead of
/// searching.
pub const BALANCED_RANDOM_PROBABILITY: f64 = 0.6;

/// Score of an immediate engine win; deeper wins score one less per ply.
const WIN_SCORE: i32 = 10;

/// How hard the engine tries.
///
/// Parsed case-insensitively from `lenient`, `balanced`, `exacting` or the
/// older `easy`, `medium`, `hard` names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Difficulty {
    /// Always a random empty square.
    #[strum(to_string = "lenient", serialize = "easy")]
    #[serde(alias = "easy")]
    Lenient,
    /// Random most of the time, otherwise a full search.
    #[default]
    #[strum(to_string = "balanced", serialize = "medium")]
    #[serde(alias = "medium")]
    Balanced,
    /// Always a full search. Never loses.
    #[strum(to_string = "exacting", serialize = "hard")]
    #[serde(alias = "hard")]
    Exacting,
}

/// Concrete move-selection strategy for a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Uniform choice among empty squares.
    Random,
    /// Minimax over every remaining square.
    Search,
}

impl Difficulty {
    /// Resolves this tier to the strategy used for one move.
    pub fn strategy(self, rng: &mut impl Rng) -> Strategy {
        match self {
            Difficulty::Lenient => Strategy::Random,
            Difficulty::Exacting => Strategy::Search,
            Difficulty::Balanced => {
                if rng.random_bool(BALANCED_RANDOM_PROBABILITY) {
                    Strategy::Random
                } else {
                    Strategy::Search
                }
            }
        }
    }
}

/// Picks the engine's next move.
///
/// Returns `None` when the board is already won or full; callers never ask
/// for a move in that state, and the sentinel makes the mistake visible
/// without panicking.
#[instrument(skip(board, rng), fields(empty = board.empty_positions().len()))]
pub fn select_move(
    board: &Board,
    engine: Mark,
    difficulty: Difficulty,
    rng: &mut impl Rng,
) -> Option<Position> {
    let strategy = difficulty.strategy(rng);
    select_move_with(board, engine, strategy, rng)
}

/// Picks the engine's next move with an already resolved strategy.
pub fn select_move_with(
    board: &Board,
    engine: Mark,
    strategy: Strategy,
    rng: &mut impl Rng,
) -> Option<Position> {
    if winning_line(board).is_some() {
        return None;
    }
    let empty = board.empty_positions();
    if empty.is_empty() {
        return None;
    }

    let choice = match strategy {
        Strategy::Random => empty[rng.random_range(0..empty.len())],
        Strategy::Search => search(board, engine)?,
    };
    debug!(?strategy, %engine, position = choice.to_index(), "Engine chose move");
    Some(choice)
}

/// Scores every empty square for `engine` by full minimax, in scan order.
///
/// Scores range from `10` (win on this move) down to `-10`; `0` means a draw
/// under perfect play from both sides. Empty when the game is already over.
pub fn best_moves(board: &Board, engine: Mark) -> Vec<(Position, i32)> {
    if winning_line(board).is_some() || board.is_full() {
        return Vec::new();
    }

    let mut scratch = board.clone();
    board
        .empty_positions()
        .into_iter()
        .map(|pos| {
            scratch.set(pos, Square::Occupied(engine));
            let score = minimax(&mut scratch, engine, 0, false);
            scratch.set(pos, Square::Empty);
            (pos, score)
        })
        .collect()
}

/// Highest scoring square; the lowest index wins a tie.
fn search(board: &Board, engine: Mark) -> Option<Position> {
    let mut best: Option<(Position, i32)> = None;
    for (pos, score) in best_moves(board, engine) {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((pos, score)),
        }
    }
    best.map(|(pos, _)| pos)
}

fn minimax(board: &mut Board, engine: Mark, depth: i32, maximizing: bool) -> i32 {
    if let Some((mark, _)) = winning_line(board) {
        return if mark == engine {
            WIN_SCORE - depth
        } else {
            depth - WIN_SCORE
        };
    }
    if board.is_full() {
        return 0;
    }

    let mark = if maximizing { engine } else { engine.opponent() };
    let mut best = if maximizing { i32::MIN } else { i32::MAX };
    for pos in Position::ALL {
        if !board.is_empty(pos) {
            continue;
        }
        board.set(pos, Square::Occupied(mark));
        let score = minimax(board, engine, depth + 1, !maximizing);
        board.set(pos, Square::Empty);
        best = if maximizing {
            best.max(score)
        } else {
            best.min(score)
        };
    }
    best
}

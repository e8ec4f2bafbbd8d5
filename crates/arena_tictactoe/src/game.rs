//! Mutable game state: board, mark to move, and current outcome.

use super::action::{Move, MoveError};
use super::rules::evaluate;
use super::{Board, Mark, Outcome, Position, Square};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// The mark that opens every game and every rematch.
pub const STARTING_MARK: Mark = Mark::X;

/// Tic-tac-toe game engine.
///
/// Holds the board together with the mark to move and the last evaluated
/// outcome. Once the outcome is terminal the board is frozen until
/// [`Game::reset`] or [`Game::replace`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    board: Board,
    to_move: Mark,
    outcome: Outcome,
}

impl Game {
    /// Creates a new game with X to move.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            to_move: STARTING_MARK,
            outcome: Outcome::InProgress,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the mark whose turn it is.
    pub fn to_move(&self) -> Mark {
        self.to_move
    }

    /// Returns the current outcome.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns true once the game has been won or drawn.
    pub fn is_over(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Validates a move without applying it.
    pub fn check(&self, action: Move) -> Result<(), MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }
        if !self.board.is_empty(action.position) {
            return Err(MoveError::SquareOccupied(action.position));
        }
        if action.mark != self.to_move {
            return Err(MoveError::WrongPlayer(action.mark));
        }
        Ok(())
    }

    /// Places the current mark at `position`.
    ///
    /// On success returns the outcome after the move. The turn passes to the
    /// opponent only when the game continues.
    #[instrument(skip(self), fields(mark = %self.to_move))]
    pub fn make_move(&mut self, position: Position) -> Result<Outcome, MoveError> {
        let action = Move::new(self.to_move, position);
        self.check(action)?;

        self.board.set(position, Square::Occupied(action.mark));
        self.outcome = evaluate(&self.board);
        if !self.outcome.is_terminal() {
            self.to_move = self.to_move.opponent();
        }

        debug!(outcome = %self.outcome, "Move applied");
        Ok(self.outcome)
    }

    /// Clears the board and gives the first move back to X.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replaces the whole state with an externally supplied board and turn.
    ///
    /// The outcome is re-evaluated from the board so the winning line is
    /// always derived locally.
    #[instrument(skip(self, board))]
    pub fn replace(&mut self, board: Board, to_move: Mark) {
        self.outcome = evaluate(&board);
        self.board = board;
        self.to_move = to_move;
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_flips_after_legal_move() {
        let mut game = Game::new();
        assert_eq!(game.make_move(Position::Center), Ok(Outcome::InProgress));
        assert_eq!(game.to_move(), Mark::O);
    }

    #[test]
    fn test_occupied_square_rejected() {
        let mut game = Game::new();
        game.make_move(Position::Center).expect("legal");
        let before = game.clone();
        assert_eq!(
            game.make_move(Position::Center),
            Err(MoveError::SquareOccupied(Position::Center))
        );
        assert_eq!(game, before);
    }

    #[test]
    fn test_winning_move_keeps_turn() {
        let mut game = Game::new();
        for idx in [0, 3, 1, 4] {
            game.make_move(Position::ALL[idx]).expect("legal");
        }
        let outcome = game.make_move(Position::TopRight).expect("legal");
        assert_eq!(outcome.winner(), Some(Mark::X));
        assert_eq!(game.to_move(), Mark::X);
        assert_eq!(game.make_move(Position::BottomLeft), Err(MoveError::GameOver));
    }

    #[test]
    fn test_wrong_mark_rejected_by_check() {
        let game = Game::new();
        assert_eq!(
            game.check(Move::new(Mark::O, Position::Center)),
            Err(MoveError::WrongPlayer(Mark::O))
        );
    }

    #[test]
    fn test_replace_recomputes_outcome() {
        let mut game = Game::new();
        let board: Board = "OOO XX. X..".parse().expect("valid");
        game.replace(board, Mark::X);
        assert_eq!(game.outcome().winner(), Some(Mark::O));
        game.reset();
        assert_eq!(game, Game::new());
    }
}

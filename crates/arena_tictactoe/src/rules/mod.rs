//! Game rules for tic-tac-toe.
//!
//! Pure functions for evaluating a board. Rules are separated from board
//! storage so the search and the session layer share one definition of
//! a finished game.

pub mod win;

pub use win::{LINES, winning_line};

use super::{Board, Outcome};
use tracing::instrument;

/// Evaluates a board.
///
/// Lines are scanned in the fixed order of [`LINES`] and the first complete
/// line wins, so the reported line is stable for a given board. A full board
/// with no complete line is a draw.
#[instrument(level = "trace")]
pub fn evaluate(board: &Board) -> Outcome {
    if let Some((mark, line)) = winning_line(board) {
        return Outcome::Win { mark, line };
    }
    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mark, Position, Square};

    fn board(layout: &str) -> Board {
        layout.parse().expect("valid layout")
    }

    #[test]
    fn test_empty_board_in_progress() {
        assert_eq!(evaluate(&Board::new()), Outcome::InProgress);
    }

    #[test]
    fn test_first_line_in_scan_order_is_reported() {
        // X completes both the top row and the left column.
        let b = board("XXX X.. XOO");
        let outcome = evaluate(&b);
        assert_eq!(
            outcome,
            Outcome::Win {
                mark: Mark::X,
                line: [Position::TopLeft, Position::TopCenter, Position::TopRight],
            }
        );
        assert_eq!(evaluate(&b), outcome);
    }

    #[test]
    fn test_column_before_diagonal() {
        let b = board("O.X .OX ..X");
        assert_eq!(
            evaluate(&b).line(),
            Some([Position::TopRight, Position::MiddleRight, Position::BottomRight])
        );
    }

    #[test]
    fn test_anti_diagonal() {
        let b = board("X.O XO. O.X");
        assert_eq!(
            evaluate(&b),
            Outcome::Win {
                mark: Mark::O,
                line: [Position::TopRight, Position::Center, Position::BottomLeft],
            }
        );
    }

    #[test]
    fn test_full_board_with_win_is_not_draw() {
        let b = board("XXX OOX XOO");
        assert_eq!(evaluate(&b).winner(), Some(Mark::X));
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let b = board("XOX XOO OXX");
        assert_eq!(evaluate(&b), Outcome::Draw);
        assert!(b.is_full());
    }

    #[test]
    fn test_open_cell_keeps_game_in_progress() {
        // Eight marks, no line, one square left.
        let b = board("XOX XOO OX.");
        assert!(!b.is_full());
        assert_eq!(evaluate(&b), Outcome::InProgress);
    }

    #[test]
    fn test_last_square_win_beats_full_board_draw() {
        let mut b = board("XOX OXO OX.");
        b.set(Position::BottomRight, Square::Occupied(Mark::X));
        assert!(b.is_full());
        assert_eq!(
            evaluate(&b),
            Outcome::Win {
                mark: Mark::X,
                line: [Position::TopLeft, Position::Center, Position::BottomRight],
            }
        );
    }
}

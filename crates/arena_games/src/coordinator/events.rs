//! Notifications out of the coordinator and messages into it.

use crate::session::{SessionId, SessionRecord, SessionStatus};
use arena_tictactoe::{Mark, MoveError, Outcome, Position};

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// A mark was placed on this device (by a person or the engine).
    MoveApplied {
        /// Mark placed.
        mark: Mark,
        /// Where it was placed.
        position: Position,
        /// Outcome after the move.
        outcome: Outcome,
    },
    /// The round ended.
    Terminal(Outcome),
    /// A local change could not be published.
    SyncFailed {
        /// Session that fell behind.
        session_id: SessionId,
        /// Store failure message.
        message: String,
    },
    /// Scores changed but could not be saved.
    ScoresNotSaved {
        /// Ledger failure message.
        message: String,
    },
    /// The pending-invitation list changed.
    InvitationsChanged(Vec<SessionRecord>),
    /// The board was replaced from the shared record.
    RemoteApplied {
        /// Mark to move after the update.
        turn: Mark,
        /// Outcome recomputed from the remote board.
        outcome: Outcome,
        /// Record status after the update.
        status: SessionStatus,
    },
}

/// Why a move did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Rejection {
    /// No match is open.
    #[display("No match is open")]
    NoMatch,
    /// The board refused the move.
    #[display("{}", _0)]
    Illegal(MoveError),
    /// The mark to move is not played from this seat.
    #[display("It is {}'s turn", _0)]
    NotYourTurn(Mark),
    /// The networked session is not accepting moves.
    #[display("Session is {}", _0)]
    SessionNotActive(SessionStatus),
}

/// Result of a move request that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDisposition {
    /// The move was placed; carries the outcome after it.
    Applied(Outcome),
    /// Nothing changed and nobody was notified.
    Ignored(Rejection),
}

impl MoveDisposition {
    /// Returns true if the move was placed.
    pub fn is_applied(&self) -> bool {
        matches!(self, MoveDisposition::Applied(_))
    }
}

/// What one [`Coordinator::step`](super::Coordinator::step) handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The engine placed its mark.
    EngineMoved(Position),
    /// A remote record update replaced the board.
    RemoteApplied,
    /// The invitation list was refreshed; carries its new length.
    InvitationsUpdated(usize),
    /// The message belonged to a match or watch that is no longer open.
    Stale,
}

/// Messages from background tasks, tagged so stale ones can be dropped.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// The engine reply timer fired.
    EngineTurn { ticket: u64 },
    /// The session record changed.
    Remote { epoch: u64, record: SessionRecord },
    /// The pending-invitation list changed.
    Invitations { watch: u64, records: Vec<SessionRecord> },
}

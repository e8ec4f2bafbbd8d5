//! Shared session records for networked matches.
//!
//! A session record is the only state shared between the two devices of a
//! networked match. It is created by the host, addressed to a guest, and
//! overwritten wholesale by whichever side makes the next legal move.

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{OnChange, SessionStore, Subscription};

use arena_tictactoe::{Board, Mark, Outcome, STARTING_MARK};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// Unique identifier for a session record.
pub type SessionId = String;

/// Unique identifier for a participant.
pub type ParticipantId = String;

/// A person who can host or join a match.
///
/// Display metadata is carried for presentation only; game logic looks at
/// the id alone.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new, Serialize, Deserialize)]
pub struct Participant {
    /// Stable participant id.
    id: ParticipantId,
    /// Name shown to the opponent.
    display_name: String,
    /// Optional avatar image.
    avatar_url: Option<String>,
}

/// Lifecycle of a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    /// Invitation sent, guest has not accepted yet.
    AwaitingAcceptance,
    /// Both participants are playing.
    Active,
    /// The round finished or the invitation was withdrawn.
    Concluded,
}

/// Terminal result stored on a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The given mark completed a line.
    Winner(Mark),
    /// The board filled with no line.
    Draw,
}

impl Verdict {
    /// Converts a board outcome into a stored verdict; `None` while in progress.
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::InProgress => None,
            Outcome::Win { mark, .. } => Some(Verdict::Winner(mark)),
            Outcome::Draw => Some(Verdict::Draw),
        }
    }
}

/// Fields a host supplies when issuing an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct SessionDraft {
    /// Participant issuing the invitation; plays X.
    host: ParticipantId,
    /// Participant the invitation is addressed to; plays O.
    guest: ParticipantId,
}

/// The shared state of one networked match.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Record id assigned by the store.
    id: SessionId,
    /// Participant who created the session (X).
    host: ParticipantId,
    /// Participant the session is addressed to (O).
    guest: ParticipantId,
    /// Current board.
    board: Board,
    /// Mark to move next.
    turn: Mark,
    /// Result of the current round, if finished.
    winner: Option<Verdict>,
    /// Lifecycle status.
    status: SessionStatus,
    /// Time of the last write, as stamped by the store.
    last_update: DateTime<Utc>,
    /// Write counter assigned by the store; starts at 0 and grows by one per update.
    #[serde(default)]
    revision: u64,
}

impl SessionRecord {
    /// Builds the initial record for a fresh invitation.
    pub fn from_draft(id: SessionId, draft: SessionDraft) -> Self {
        Self {
            id,
            host: draft.host,
            guest: draft.guest,
            board: Board::new(),
            turn: STARTING_MARK,
            winner: None,
            status: SessionStatus::AwaitingAcceptance,
            last_update: Utc::now(),
            revision: 0,
        }
    }

    /// Returns true if `participant` is the host or the guest.
    pub fn involves(&self, participant: &str) -> bool {
        self.host == participant || self.guest == participant
    }

    /// Mark played by `participant`, if they belong to this session.
    pub fn mark_of(&self, participant: &str) -> Option<Mark> {
        if self.host == participant {
            Some(Mark::X)
        } else if self.guest == participant {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Overwrites the fields present in `patch`, stamps the write time and
    /// bumps the revision.
    pub fn apply_patch(&mut self, patch: SessionPatch) {
        if let Some(board) = patch.board {
            self.board = board;
        }
        if let Some(turn) = patch.turn {
            self.turn = turn;
        }
        if let Some(winner) = patch.winner {
            self.winner = winner;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.last_update = Utc::now();
        self.revision += 1;
    }
}

/// Partial update of a session record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct SessionPatch {
    /// Replacement board.
    board: Option<Board>,
    /// Replacement turn.
    turn: Option<Mark>,
    /// Replacement verdict; `Some(None)` clears it.
    winner: Option<Option<Verdict>>,
    /// Replacement status.
    status: Option<SessionStatus>,
}

impl SessionPatch {
    /// Patch carrying the full round state: board, turn and verdict.
    pub fn round(board: Board, turn: Mark, winner: Option<Verdict>) -> Self {
        Self::default()
            .with_board(board)
            .with_turn(turn)
            .with_winner(winner)
    }
}

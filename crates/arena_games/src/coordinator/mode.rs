//! Match modes and the phase derived from them.

use crate::session::{ParticipantId, SessionId, SessionStatus};
use arena_tictactoe::{Difficulty, Mark};
use derive_getters::Getters;
use derive_new::new;
use std::time::Duration;

/// Delay before the engine answers a human move.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(600);

/// Mark the engine plays in single-player matches.
pub const ENGINE_MARK: Mark = Mark::O;

/// Mode requested from the lobby. Networked matches start through
/// invitations instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChoice {
    /// Two people sharing one device.
    Local,
    /// A person against the engine.
    Engine(Difficulty),
}

/// The seat the local participant holds in a networked match.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct NetworkSeat {
    /// Shared record backing the match.
    session_id: SessionId,
    /// Mark owned by the local participant.
    local_mark: Mark,
    /// The other participant.
    opponent: ParticipantId,
    /// Last known record status.
    status: SessionStatus,
}

impl NetworkSeat {
    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

/// What the coordinator is currently hosting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// No match open.
    #[default]
    Lobby,
    /// Both marks played on this device.
    Local,
    /// The engine plays [`ENGINE_MARK`].
    Engine {
        /// Difficulty fixed for this match.
        difficulty: Difficulty,
    },
    /// One mark is played remotely through a session record.
    Networked(NetworkSeat),
}

impl Mode {
    /// Returns true when a match is open.
    pub fn is_open(&self) -> bool {
        !matches!(self, Mode::Lobby)
    }
}

/// What the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Phase {
    /// Lobby; no match open.
    Idle,
    /// Waiting for local input.
    Ready,
    /// An engine reply is scheduled.
    EngineThinking,
    /// Waiting for the remote participant to move.
    AwaitingOpponent,
    /// The invitation has not been accepted yet.
    AwaitingAcceptance,
    /// The round is won or drawn; only reset or leave do anything.
    Terminal,
    /// The session was concluded elsewhere without a result; input is locked.
    Closed,
}

/// Tunables for a coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct CoordinatorSettings {
    /// Delay before an engine reply.
    reply_delay: Duration,
    /// Seed for the engine's random source; entropy when absent.
    seed: Option<u64>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_DELAY, None)
    }
}

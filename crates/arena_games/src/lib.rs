//! Arena Games - match coordination for tic-tac-toe
//!
//! Wraps the [`arena_tictactoe`] outcome engine in a session coordinator
//! that hosts three kinds of match.
//!
//! # Architecture
//!
//! - **Coordinator**: state machine owning the board, turn ownership,
//!   engine replies and score
//! - **Session**: shared records for networked matches and the store they
//!   live in
//! - **Score**: win counters and optional persistence
//! - **Config**: TOML settings for the `arena` binary
//!
//! # Example
//!
//! ```no_run
//! use arena_games::{Coordinator, CoordinatorSettings, MemoryStore, ModeChoice, Participant};
//! use arena_tictactoe::Difficulty;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let me = Participant::new("amal".to_string(), "Amal".to_string(), None);
//! let mut coordinator = Coordinator::new(
//!     me,
//!     Arc::new(MemoryStore::new()),
//!     CoordinatorSettings::default(),
//! );
//!
//! coordinator.select_mode(ModeChoice::Engine(Difficulty::Exacting))?;
//! coordinator.apply_move(4).await?;
//! coordinator.step().await?; // engine reply
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod coordinator;
mod error;
mod score;
mod session;

// Crate-level exports - Configuration
pub use config::{ArenaConfig, ConfigError};

// Crate-level exports - Coordinator
pub use coordinator::{
    Coordinator, CoordinatorEvent, CoordinatorSettings, DEFAULT_REPLY_DELAY, ENGINE_MARK, Mode,
    ModeChoice, MoveDisposition, NetworkSeat, Phase, Rejection, StepOutcome,
};

// Crate-level exports - Errors
pub use error::{CoordinatorError, LedgerError, StoreError};

// Crate-level exports - Scores
pub use score::{EphemeralLedger, JsonFileLedger, ScoreLedger, Scoreboard};

// Crate-level exports - Sessions
pub use session::{
    MemoryStore, OnChange, Participant, ParticipantId, SessionDraft, SessionId, SessionPatch,
    SessionRecord, SessionStatus, SessionStore, Subscription, Verdict,
};

//! Error types for the session layer.

use crate::session::SessionId;
use derive_more::{Display, Error};
use tracing::instrument;

/// Session store failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Score ledger failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Ledger error: {} at {}:{}", message, file, line)]
pub struct LedgerError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LedgerError {
    /// Creates a new ledger error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for LedgerError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Malformed score file: {}", err))
    }
}

/// Failures surfaced by the coordinator.
///
/// Illegal moves are not errors; they come back as
/// [`MoveDisposition::Ignored`](crate::MoveDisposition::Ignored).
#[derive(Debug, Clone, Display)]
pub enum CoordinatorError {
    /// A mode was requested while another match is open.
    #[display("A match is already open; leave it first")]
    ModeActive,

    /// The operation needs an open match.
    #[display("No match is open")]
    NoMatch,

    /// The host tried to invite themselves.
    #[display("Cannot invite yourself")]
    SelfInvite,

    /// The invitation is addressed to someone else.
    #[display("Invitation {} is not addressed to you", _0)]
    NotAddressed(SessionId),

    /// The session record disappeared from the store.
    #[display("Session {} no longer exists", _0)]
    SessionMissing(SessionId),

    /// There is no pending invitation hosted by this participant.
    #[display("No pending invitation to withdraw")]
    NotPending,

    /// A store call failed before any local state changed.
    #[display("{}", _0)]
    Store(StoreError),

    /// Publishing local state failed after it was applied locally.
    ///
    /// The local board keeps the move; the caller decides whether to retry.
    #[display("Sync failed for session {}: {}", session_id, source)]
    Sync {
        /// Session whose record is now behind the local state.
        session_id: SessionId,
        /// Underlying store failure.
        source: StoreError,
    },
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Store(err) | CoordinatorError::Sync { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

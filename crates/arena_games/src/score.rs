//! Win counters and where they are kept between runs.

use crate::error::LedgerError;
use arena_tictactoe::Mark;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Per-mark win counters for one open match screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    x: u32,
    o: u32,
}

impl Scoreboard {
    /// Creates a scoreboard with the given counts.
    pub fn new(x: u32, o: u32) -> Self {
        Self { x, o }
    }

    /// Wins recorded for `mark`.
    pub fn wins(&self, mark: Mark) -> u32 {
        match mark {
            Mark::X => self.x,
            Mark::O => self.o,
        }
    }

    /// Adds one win for `mark`.
    pub fn record_win(&mut self, mark: Mark) {
        match mark {
            Mark::X => self.x += 1,
            Mark::O => self.o += 1,
        }
    }
}

impl std::fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X {} - {} O", self.x, self.o)
    }
}

/// Keeps a scoreboard across coordinator instances.
///
/// The coordinator loads once when the ledger is attached and saves after
/// every change.
pub trait ScoreLedger: Send + std::fmt::Debug {
    /// Returns the stored scoreboard, or zeroes if nothing is stored.
    fn load(&self) -> Result<Scoreboard, LedgerError>;

    /// Replaces the stored scoreboard.
    fn save(&self, scores: &Scoreboard) -> Result<(), LedgerError>;
}

/// Ledger that stores nothing; scores live only as long as the coordinator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralLedger;

impl ScoreLedger for EphemeralLedger {
    fn load(&self) -> Result<Scoreboard, LedgerError> {
        Ok(Scoreboard::default())
    }

    fn save(&self, _scores: &Scoreboard) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Ledger backed by a small JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileLedger {
    path: PathBuf,
}

impl JsonFileLedger {
    /// Creates a ledger at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScoreLedger for JsonFileLedger {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Scoreboard, LedgerError> {
        if !self.path.exists() {
            debug!("No score file yet");
            return Ok(Scoreboard::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let scores: Scoreboard = serde_json::from_str(&content)?;
        info!(%scores, "Scores loaded");
        Ok(scores)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn save(&self, scores: &Scoreboard) -> Result<(), LedgerError> {
        let content = serde_json::to_string_pretty(scores)?;
        std::fs::write(&self.path, content)?;
        debug!(%scores, "Scores saved");
        Ok(())
    }
}

//! Arena configuration loaded from TOML.

use crate::coordinator::CoordinatorSettings;
use crate::score::{EphemeralLedger, JsonFileLedger, ScoreLedger};
use arena_tictactoe::Difficulty;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Settings for the `arena` binary and the coordinators it builds.
///
/// Difficulty is validated here, at the edge: anything other than
/// `lenient`, `balanced`, `exacting` (or `easy`, `medium`, `hard`) fails to
/// load.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", strip_option)]
pub struct ArenaConfig {
    /// Name used as the local participant id.
    #[serde(default = "default_player_name")]
    player_name: String,

    /// Engine difficulty for single-player matches.
    #[serde(default)]
    difficulty: Difficulty,

    /// Delay before the engine answers a move, in milliseconds.
    #[serde(default = "default_reply_delay_ms")]
    reply_delay_ms: u64,

    /// Seed for the engine's random source. Random when absent.
    #[serde(default)]
    seed: Option<u64>,

    /// File to keep scores in between runs. Scores are not kept when absent.
    #[serde(default)]
    score_file: Option<PathBuf>,
}

fn default_player_name() -> String {
    "player".to_string()
}

fn default_reply_delay_ms() -> u64 {
    600
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            player_name: default_player_name(),
            difficulty: Difficulty::default(),
            reply_delay_ms: default_reply_delay_ms(),
            seed: None,
            score_file: None,
        }
    }
}

impl ArenaConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(player = %config.player_name, difficulty = %config.difficulty, "Config loaded");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Coordinator settings derived from this configuration.
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::new(Duration::from_millis(self.reply_delay_ms), self.seed)
    }

    /// The score ledger selected by `score_file`.
    pub fn ledger(&self) -> Box<dyn ScoreLedger> {
        match &self.score_file {
            Some(path) => Box::new(JsonFileLedger::new(path.clone())),
            None => Box::new(EphemeralLedger),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

//! Command-line interface for the arena.

use arena_tictactoe::Difficulty;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Arena - tic-tac-toe against a friend, the engine, or over a session store
#[derive(Parser, Debug)]
#[command(name = "arena")]
#[command(about = "Tic-tac-toe matches with a minimax engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play on this terminal, entering cells 1-9
    Play {
        /// Engine difficulty (lenient, balanced, exacting)
        #[arg(short, long)]
        difficulty: Option<Difficulty>,

        /// Two players on one terminal instead of the engine
        #[arg(long)]
        local: bool,
    },

    /// Let the engine play itself and print the tally
    Selfplay {
        /// Number of games
        #[arg(short, long, default_value = "100")]
        games: u32,

        /// Difficulty for X
        #[arg(long, default_value = "exacting")]
        x: Difficulty,

        /// Difficulty for O
        #[arg(long, default_value = "exacting")]
        o: Difficulty,
    },

    /// Show the engine's score for every empty cell
    Hint {
        /// Board as nine cells of X, O or '.', row by row
        #[arg(short, long)]
        board: String,
    },

    /// Run a scripted networked match between two coordinators
    Duel,
}

//! Arena - tic-tac-toe on the terminal
//!
//! Plays matches through the session coordinator, runs engine self-play,
//! and prints move hints.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result, bail};
use arena_games::{
    ArenaConfig, Coordinator, MemoryStore, ModeChoice, MoveDisposition, Participant, Phase,
    SessionStore,
};
use arena_tictactoe::{Board, Difficulty, Game, Mark, Outcome, best_moves, select_move};
use clap::Parser;
use cli::{Cli, Command};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

/// Longest wait for one networked update in the scripted duel.
const DUEL_STEP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Command::Play { difficulty, local } => {
            let config = match difficulty {
                Some(difficulty) => config.with_difficulty(difficulty),
                None => config,
            };
            run_play(config, local).await
        }
        Command::Selfplay { games, x, o } => run_selfplay(&config, games, x, o),
        Command::Hint { board } => run_hint(&board),
        Command::Duel => run_duel(&config).await,
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ArenaConfig> {
    match path {
        Some(path) => Ok(ArenaConfig::from_file(path)?),
        None => Ok(ArenaConfig::default()),
    }
}

fn participant(id: &str) -> Participant {
    Participant::new(id.to_string(), id.to_string(), None)
}

/// Interactive match on stdin/stdout.
#[instrument(skip(config))]
async fn run_play(config: ArenaConfig, local: bool) -> Result<()> {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let mut coordinator = Coordinator::new(
        participant(config.player_name()),
        store,
        config.coordinator_settings(),
    )
    .with_ledger(config.ledger())?;

    let choice = if local {
        ModeChoice::Local
    } else {
        ModeChoice::Engine(*config.difficulty())
    };
    coordinator.select_mode(choice)?;
    info!(?choice, "Match started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", coordinator.board().display());

    loop {
        match coordinator.phase() {
            Phase::EngineThinking => {
                coordinator.step().await?;
                println!("\n{}", coordinator.board().display());
                continue;
            }
            Phase::Terminal => {
                println!("{}  [{}]", coordinator.outcome(), coordinator.scores());
                println!("r = rematch, q = quit");
            }
            _ => println!("{} to move (1-9, q = quit):", coordinator.to_move()),
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "q" => break,
            "r" => {
                coordinator.reset_match().await?;
                println!("{}", coordinator.board().display());
            }
            input => {
                let Ok(cell) = input.parse::<usize>() else {
                    println!("Enter a number from 1 to 9");
                    continue;
                };
                match coordinator.apply_move(cell.wrapping_sub(1)).await? {
                    MoveDisposition::Applied(_) => println!("\n{}", coordinator.board().display()),
                    MoveDisposition::Ignored(reason) => println!("{}", reason),
                }
            }
        }
    }

    coordinator.leave_match();
    println!("Final score: {}", coordinator.scores());
    Ok(())
}

/// Engine against engine, without the coordinator.
#[instrument(skip(config))]
fn run_selfplay(config: &ArenaConfig, games: u32, x: Difficulty, o: Difficulty) -> Result<()> {
    let mut rng = match config.seed() {
        Some(seed) => StdRng::seed_from_u64(*seed),
        None => StdRng::from_os_rng(),
    };
    let (mut x_wins, mut o_wins, mut draws) = (0u32, 0u32, 0u32);

    for _ in 0..games {
        let mut game = Game::new();
        while !game.is_over() {
            let mover = game.to_move();
            let difficulty = if mover == Mark::X { x } else { o };
            let position = select_move(game.board(), mover, difficulty, &mut rng)
                .context("engine found no move on an open board")?;
            game.make_move(position)?;
        }
        match game.outcome() {
            Outcome::Win { mark: Mark::X, .. } => x_wins += 1,
            Outcome::Win { mark: Mark::O, .. } => o_wins += 1,
            _ => draws += 1,
        }
    }

    info!(games, x_wins, o_wins, draws, "Self-play finished");
    println!("X ({x}) wins: {x_wins}");
    println!("O ({o}) wins: {o_wins}");
    println!("Draws: {draws}");
    Ok(())
}

/// Prints minimax scores for the mark to move.
fn run_hint(board: &str) -> Result<()> {
    let board: Board = board.parse()?;
    let mover = if board.count(Mark::X) > board.count(Mark::O) {
        Mark::O
    } else {
        Mark::X
    };

    println!("{}", board.display());
    let scores = best_moves(&board, mover);
    if scores.is_empty() {
        println!("Game is over");
        return Ok(());
    }
    println!("{} to move:", mover);
    for (position, score) in scores {
        println!("  {} ({}): {}", position.to_index() + 1, position, score);
    }
    Ok(())
}

/// Two coordinators playing a fixed networked match over one store.
#[instrument(skip(config))]
async fn run_duel(config: &ArenaConfig) -> Result<()> {
    let store = MemoryStore::new();
    let settings = config.coordinator_settings();
    let mut host = Coordinator::new(participant("host"), Arc::new(store.clone()), settings);
    let mut guest = Coordinator::new(participant("guest"), Arc::new(store), settings);

    guest.watch_invitations().await?;
    let session_id = host.create_invitation("guest".to_string()).await?;
    info!(%session_id, "Host invited guest");

    while guest.invitations().is_empty() {
        step_once(&mut guest).await?;
    }
    let invitation = guest.invitations()[0].clone();
    guest.accept_invitation(&invitation).await?;

    // X takes the top row while O answers in the middle.
    let script = [0usize, 4, 1, 5, 2];
    for (turn, cell) in script.into_iter().enumerate() {
        let (mover, waiter) = if turn % 2 == 0 {
            (&mut host, &mut guest)
        } else {
            (&mut guest, &mut host)
        };
        wait_for_turn(mover).await?;
        if !mover.apply_move(cell).await?.is_applied() {
            bail!("scripted move {} at cell {} was refused", turn, cell);
        }
        info!(player = %mover.participant().id(), cell, "Move sent");
        if mover.outcome().is_terminal() {
            wait_for_turn(waiter).await?;
            break;
        }
    }

    println!("{}", guest.board().display());
    println!("Host sees: {}  Guest sees: {}", host.outcome(), guest.outcome());
    Ok(())
}

/// Steps until `coordinator` may move or the round is over.
async fn wait_for_turn(coordinator: &mut Coordinator) -> Result<()> {
    while !matches!(coordinator.phase(), Phase::Ready | Phase::Terminal) {
        step_once(coordinator).await?;
    }
    Ok(())
}

async fn step_once(coordinator: &mut Coordinator) -> Result<()> {
    tokio::time::timeout(DUEL_STEP_TIMEOUT, coordinator.step())
        .await
        .context("timed out waiting for the session store")??;
    Ok(())
}

//! Coordinator behaviour against the engine.
//!
//! These tests run on a paused clock, so the reply delay elapses as soon as
//! the test waits on it.

use arena_games::{
    Coordinator, CoordinatorEvent, CoordinatorSettings, DEFAULT_REPLY_DELAY, ENGINE_MARK,
    MemoryStore, ModeChoice, Participant, Phase, StepOutcome,
};
use arena_tictactoe::{Board, Difficulty, Mark};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn engine_match(difficulty: Difficulty) -> Coordinator {
    let me = Participant::new("amal".to_string(), "Amal".to_string(), None);
    let mut coordinator = Coordinator::new(
        me,
        Arc::new(MemoryStore::new()),
        CoordinatorSettings::new(DEFAULT_REPLY_DELAY, Some(11)),
    );
    coordinator
        .select_mode(ModeChoice::Engine(difficulty))
        .expect("mode");
    coordinator
}

/// Plays the first open cell from `preference` each turn until the round ends.
async fn play_against_engine(coordinator: &mut Coordinator, preference: &[usize]) {
    while !coordinator.outcome().is_terminal() {
        let cell = preference
            .iter()
            .copied()
            .find(|&cell| coordinator.board().squares()[cell].mark().is_none())
            .expect("an open cell remains");
        let disposition = coordinator.apply_move(cell).await.expect("move");
        assert!(disposition.is_applied());
        if coordinator.outcome().is_terminal() {
            break;
        }
        assert!(coordinator.has_pending_reply());
        let step = coordinator.step().await.expect("engine reply");
        assert!(matches!(step, StepOutcome::EngineMoved(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_exacting_engine_survives_corner_corner_edge() {
    let patterns: [&[usize]; 4] = [
        &[0, 8, 1, 2, 3, 5, 6, 7, 4],
        &[2, 6, 5, 1, 3, 7, 0, 8, 4],
        &[0, 8, 3, 1, 2, 5, 6, 7, 4],
        &[6, 2, 7, 1, 0, 3, 5, 8, 4],
    ];
    for pattern in patterns {
        let mut c = engine_match(Difficulty::Exacting);
        play_against_engine(&mut c, pattern).await;
        assert_ne!(c.outcome().winner(), Some(Mark::X), "pattern {:?}", pattern);
    }
}

#[tokio::test(start_paused = true)]
async fn test_exacting_engine_takes_a_corner_after_centre() {
    let mut c = engine_match(Difficulty::Exacting);
    c.apply_move(4).await.expect("move");
    assert_eq!(c.phase(), Phase::EngineThinking);

    let step = c.step().await.expect("reply");
    assert_eq!(
        step,
        StepOutcome::EngineMoved(arena_tictactoe::Position::TopLeft)
    );
    assert_eq!(c.to_move(), Mark::X);
    assert_eq!(c.phase(), Phase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_engine_reply_waits_for_the_delay() {
    let mut c = engine_match(Difficulty::Lenient);
    c.apply_move(4).await.expect("move");

    tokio::time::sleep(DEFAULT_REPLY_DELAY / 2).await;
    assert!(c.try_step().await.expect("step").is_none());
    assert_eq!(c.board().count(ENGINE_MARK), 0);

    tokio::time::sleep(DEFAULT_REPLY_DELAY).await;
    let step = c.try_step().await.expect("step");
    assert!(matches!(step, Some(StepOutcome::EngineMoved(_))));
    assert_eq!(c.board().count(ENGINE_MARK), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leaving_cancels_the_pending_reply() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut c = engine_match(Difficulty::Exacting).with_events(tx);
    c.apply_move(4).await.expect("move");
    assert!(matches!(
        rx.try_recv(),
        Ok(CoordinatorEvent::MoveApplied { mark: Mark::X, .. })
    ));

    c.leave_match();
    assert!(!c.has_pending_reply());
    tokio::time::sleep(DEFAULT_REPLY_DELAY * 3).await;

    assert!(c.try_step().await.expect("step").is_none());
    assert_eq!(c.board(), &Board::new());
    assert_eq!(c.phase(), Phase::Idle);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reply_already_queued_is_dropped_after_leaving() {
    let mut c = engine_match(Difficulty::Exacting);
    c.apply_move(4).await.expect("move");

    // The timer fires and queues its message before the player leaves.
    tokio::time::sleep(DEFAULT_REPLY_DELAY + Duration::from_millis(100)).await;
    c.leave_match();

    let step = c.try_step().await.expect("step");
    assert_eq!(step, Some(StepOutcome::Stale));
    assert_eq!(c.board(), &Board::new());
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_the_pending_reply() {
    let mut c = engine_match(Difficulty::Exacting);
    c.apply_move(0).await.expect("move");
    c.reset_match().await.expect("reset");

    tokio::time::sleep(DEFAULT_REPLY_DELAY * 2).await;
    assert!(c.try_step().await.expect("step").is_none());
    assert_eq!(c.board(), &Board::new());
    assert_eq!(c.to_move(), Mark::X);
    assert_eq!(c.phase(), Phase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_lenient_engine_loses_and_is_scored() {
    // Human keeps to the left column; a lenient engine only blocks by luck.
    let mut won = false;
    for seed in 0..20 {
        let me = Participant::new("amal".to_string(), "Amal".to_string(), None);
        let mut c = Coordinator::new(
            me,
            Arc::new(MemoryStore::new()),
            CoordinatorSettings::new(Duration::from_millis(10), Some(seed)),
        );
        c.select_mode(ModeChoice::Engine(Difficulty::Lenient))
            .expect("mode");
        play_against_engine(&mut c, &[0, 3, 6, 1, 2, 4, 5, 7, 8]).await;
        if c.outcome().winner() == Some(Mark::X) {
            assert_eq!(c.scores().wins(Mark::X), 1);
            won = true;
        }
    }
    assert!(won, "a random engine should lose at least once in 20 games");
}

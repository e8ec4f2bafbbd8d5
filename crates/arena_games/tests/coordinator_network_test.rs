//! Networked matches between coordinators sharing one session store.

use arena_games::{
    Coordinator, CoordinatorError, CoordinatorEvent, CoordinatorSettings, MemoryStore,
    MoveDisposition, OnChange, Participant, ParticipantId, Phase, Rejection, Scoreboard,
    SessionDraft, SessionId, SessionPatch, SessionRecord, SessionStatus, SessionStore,
    StepOutcome, StoreError, Subscription,
};
use arena_tictactoe::{Board, Mark, Outcome, Position, Square};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

fn coordinator(id: &str, store: &MemoryStore) -> Coordinator {
    let me = Participant::new(id.to_string(), id.to_uppercase(), None);
    Coordinator::new(
        me,
        Arc::new(store.clone()),
        CoordinatorSettings::default(),
    )
}

/// Store whose clock runs behind the devices: every record it hands out is
/// stamped two seconds before the write actually happened.
struct LaggingClockStore {
    inner: MemoryStore,
}

impl LaggingClockStore {
    fn lag(record: SessionRecord) -> SessionRecord {
        let stamp = *record.last_update() - chrono::Duration::seconds(2);
        let mut value = serde_json::to_value(&record).expect("encode record");
        value["last_update"] = serde_json::to_value(stamp).expect("encode stamp");
        serde_json::from_value(value).expect("decode record")
    }
}

#[async_trait::async_trait]
impl SessionStore for LaggingClockStore {
    async fn create(&self, draft: SessionDraft) -> Result<SessionId, StoreError> {
        self.inner.create(draft).await
    }

    async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<u64, StoreError> {
        self.inner.update(id, patch).await
    }

    async fn fetch(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.inner.fetch(id).await?.map(Self::lag))
    }

    async fn subscribe(
        &self,
        id: &SessionId,
        on_change: OnChange<SessionRecord>,
    ) -> Result<Subscription, StoreError> {
        self.inner
            .subscribe(id, Box::new(move |record| on_change(Self::lag(record))))
            .await
    }

    async fn list_pending_for(
        &self,
        participant: &ParticipantId,
        on_change: OnChange<Vec<SessionRecord>>,
    ) -> Result<Subscription, StoreError> {
        self.inner
            .list_pending_for(
                participant,
                Box::new(move |records| {
                    on_change(records.into_iter().map(Self::lag).collect())
                }),
            )
            .await
    }
}

async fn step(coordinator: &mut Coordinator) -> StepOutcome {
    tokio::time::timeout(STEP_TIMEOUT, coordinator.step())
        .await
        .expect("timed out waiting for an update")
        .expect("step")
}

async fn step_until(coordinator: &mut Coordinator, done: impl Fn(&Coordinator) -> bool) {
    while !done(coordinator) {
        step(coordinator).await;
    }
}

/// Host invites guest, guest accepts, host sees the session go active.
async fn open_match(store: &MemoryStore) -> (Coordinator, Coordinator, SessionId) {
    let mut host = coordinator("host", store);
    let mut guest = coordinator("guest", store);

    guest.watch_invitations().await.expect("watch");
    let session_id = host
        .create_invitation("guest".to_string())
        .await
        .expect("invite");
    step_until(&mut guest, |c| !c.invitations().is_empty()).await;

    let invitation = guest.invitations()[0].clone();
    guest.accept_invitation(&invitation).await.expect("accept");
    step_until(&mut host, |c| c.phase() == Phase::Ready).await;
    (host, guest, session_id)
}

#[tokio::test]
async fn test_invitation_reaches_guest_and_board_syncs() {
    let store = MemoryStore::new();
    let mut host = coordinator("host", &store);
    let mut guest = coordinator("guest", &store);

    guest.watch_invitations().await.expect("watch");
    let session_id = host
        .create_invitation("guest".to_string())
        .await
        .expect("invite");
    assert_eq!(host.phase(), Phase::AwaitingAcceptance);
    assert_eq!(host.local_mark(), Some(Mark::X));
    assert_eq!(host.opponent(), Some(&"guest".to_string()));

    // Nobody can move before the guest accepts.
    let early = host.apply_move(4).await.expect("move");
    assert_eq!(
        early,
        MoveDisposition::Ignored(Rejection::SessionNotActive(
            SessionStatus::AwaitingAcceptance
        ))
    );

    step_until(&mut guest, |c| !c.invitations().is_empty()).await;
    let invitation = guest.invitations()[0].clone();
    assert_eq!(invitation.id(), &session_id);
    assert_eq!(invitation.host(), "host");

    guest.accept_invitation(&invitation).await.expect("accept");
    assert_eq!(guest.local_mark(), Some(Mark::O));
    assert_eq!(guest.phase(), Phase::AwaitingOpponent);
    let record = store
        .fetch(&session_id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(*record.status(), SessionStatus::Active);

    step_until(&mut host, |c| c.phase() == Phase::Ready).await;
    host.apply_move(4).await.expect("host move");
    assert_eq!(host.phase(), Phase::AwaitingOpponent);

    // The guest never calls apply_move; the board arrives through the store.
    step_until(&mut guest, |c| c.phase() == Phase::Ready).await;
    assert_eq!(guest.board(), host.board());
    assert_eq!(guest.board().get(Position::Center), Square::Occupied(Mark::X));
    assert_eq!(guest.to_move(), Mark::O);
    assert!(guest.invitations().is_empty());
}

#[tokio::test]
async fn test_move_out_of_turn_is_not_published() {
    let store = MemoryStore::new();
    let (_host, mut guest, session_id) = open_match(&store).await;

    let disposition = guest.apply_move(0).await.expect("move");
    assert_eq!(
        disposition,
        MoveDisposition::Ignored(Rejection::NotYourTurn(Mark::X))
    );
    let record = store
        .fetch(&session_id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(record.board(), &Board::new());
}

#[tokio::test]
async fn test_publish_failure_keeps_local_move_and_reports() {
    let store = MemoryStore::new();
    let (host, _guest, session_id) = open_match(&store).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut host = host.with_events(tx);

    store.set_offline(true);
    let result = host.apply_move(4).await;
    assert!(matches!(
        result,
        Err(CoordinatorError::Sync { session_id: ref id, .. }) if id == &session_id
    ));
    assert_eq!(host.board().get(Position::Center), Square::Occupied(Mark::X));

    assert!(matches!(
        rx.try_recv(),
        Ok(CoordinatorEvent::MoveApplied { .. })
    ));
    assert!(matches!(
        rx.try_recv(),
        Ok(CoordinatorEvent::SyncFailed { .. })
    ));

    store.set_offline(false);
    let record = store
        .fetch(&session_id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(record.board(), &Board::new());
}

#[tokio::test]
async fn test_networked_win_is_counted_once_on_both_sides() {
    let store = MemoryStore::new();
    let (mut host, mut guest, session_id) = open_match(&store).await;

    for (turn, cell) in [0usize, 3, 1, 4, 2].into_iter().enumerate() {
        let (mover, waiter) = if turn % 2 == 0 {
            (&mut host, &mut guest)
        } else {
            (&mut guest, &mut host)
        };
        step_until(mover, |c| matches!(c.phase(), Phase::Ready)).await;
        assert!(mover.apply_move(cell).await.expect("move").is_applied());
        if turn == 4 {
            step_until(waiter, |c| c.phase() == Phase::Terminal).await;
        }
    }

    assert_eq!(host.scores(), Scoreboard::new(1, 0));
    assert_eq!(guest.scores(), Scoreboard::new(1, 0));
    assert_eq!(
        guest.outcome(),
        Outcome::Win {
            mark: Mark::X,
            line: [Position::TopLeft, Position::TopCenter, Position::TopRight],
        }
    );
    let record = store
        .fetch(&session_id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(*record.status(), SessionStatus::Concluded);

    // Rematch: the host resets before draining the echo of its winning write.
    host.reset_match().await.expect("reset");
    step_until(&mut guest, |c| c.board() == &Board::new()).await;
    assert_eq!(guest.phase(), Phase::AwaitingOpponent);

    host.apply_move(4).await.expect("rematch move");
    step_until(&mut guest, |c| c.phase() == Phase::Ready).await;
    guest.apply_move(0).await.expect("rematch reply");
    step_until(&mut host, |c| c.phase() == Phase::Ready).await;

    assert_eq!(host.scores(), Scoreboard::new(1, 0));
    assert_eq!(guest.scores(), Scoreboard::new(1, 0));
    assert_eq!(host.board(), guest.board());
}

#[tokio::test]
async fn test_withdrawn_invitation_disappears_and_locks_late_accept() {
    let store = MemoryStore::new();
    let mut host = coordinator("host", &store);
    let mut guest = coordinator("guest", &store);

    guest.watch_invitations().await.expect("watch");
    host.create_invitation("guest".to_string())
        .await
        .expect("invite");
    step_until(&mut guest, |c| !c.invitations().is_empty()).await;
    let stale = guest.invitations()[0].clone();

    host.withdraw_invitation().await.expect("withdraw");
    assert_eq!(host.phase(), Phase::Idle);
    step_until(&mut guest, |c| c.invitations().is_empty()).await;

    guest.accept_invitation(&stale).await.expect("accept");
    assert_eq!(guest.phase(), Phase::Closed);
    let disposition = guest.apply_move(4).await.expect("move");
    assert_eq!(
        disposition,
        MoveDisposition::Ignored(Rejection::SessionNotActive(SessionStatus::Concluded))
    );

    guest.reset_match().await.expect("reset is a no-op");
    let record = store
        .fetch(stale.id())
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(*record.status(), SessionStatus::Concluded);
}

#[tokio::test]
async fn test_withdraw_needs_a_pending_hosted_invitation() {
    let store = MemoryStore::new();
    let (mut host, mut guest, _) = open_match(&store).await;
    assert!(matches!(
        host.withdraw_invitation().await,
        Err(CoordinatorError::NotPending)
    ));
    assert!(matches!(
        guest.withdraw_invitation().await,
        Err(CoordinatorError::NotPending)
    ));
}

#[tokio::test]
async fn test_accept_rejects_invitation_for_someone_else() {
    let store = MemoryStore::new();
    let mut host = coordinator("host", &store);
    let mut guest = coordinator("guest", &store);
    let mut outsider = coordinator("outsider", &store);

    guest.watch_invitations().await.expect("watch");
    host.create_invitation("guest".to_string())
        .await
        .expect("invite");
    step_until(&mut guest, |c| !c.invitations().is_empty()).await;
    let invitation = guest.invitations()[0].clone();

    assert!(matches!(
        outsider.accept_invitation(&invitation).await,
        Err(CoordinatorError::NotAddressed(_))
    ));
    assert_eq!(outsider.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_updates_after_leaving_are_ignored() {
    let store = MemoryStore::new();
    let (mut host, mut guest, _) = open_match(&store).await;

    guest.leave_match();
    host.apply_move(4).await.expect("host move");
    tokio::time::sleep(Duration::from_millis(50)).await;

    while let Some(step) = guest.try_step().await.expect("step") {
        assert_ne!(step, StepOutcome::RemoteApplied);
    }
    assert_eq!(guest.phase(), Phase::Idle);
    assert_eq!(guest.board(), &Board::new());
}

#[tokio::test]
async fn test_stopped_watch_drops_queued_lists() {
    let store = MemoryStore::new();
    let mut host = coordinator("host", &store);
    let mut guest = coordinator("guest", &store);

    guest.watch_invitations().await.expect("watch");
    host.create_invitation("guest".to_string())
        .await
        .expect("invite");
    tokio::time::sleep(Duration::from_millis(50)).await;
    guest.stop_watching_invitations();

    while let Some(step) = guest.try_step().await.expect("step") {
        assert_eq!(step, StepOutcome::Stale);
    }
    assert!(guest.invitations().is_empty());
}

#[tokio::test]
async fn test_moves_arrive_when_store_clock_lags_devices() {
    let shared: Arc<dyn SessionStore> = Arc::new(LaggingClockStore {
        inner: MemoryStore::new(),
    });
    let mut host = Coordinator::new(
        Participant::new("host".to_string(), "HOST".to_string(), None),
        shared.clone(),
        CoordinatorSettings::default(),
    );
    let mut guest = Coordinator::new(
        Participant::new("guest".to_string(), "GUEST".to_string(), None),
        shared,
        CoordinatorSettings::default(),
    );

    guest.watch_invitations().await.expect("watch");
    host.create_invitation("guest".to_string())
        .await
        .expect("invite");
    step_until(&mut guest, |c| !c.invitations().is_empty()).await;
    let invitation = guest.invitations()[0].clone();
    guest.accept_invitation(&invitation).await.expect("accept");
    step_until(&mut host, |c| c.phase() == Phase::Ready).await;

    host.apply_move(4).await.expect("host move");
    step_until(&mut guest, |c| c.phase() == Phase::Ready).await;
    assert_eq!(guest.board().get(Position::Center), Square::Occupied(Mark::X));

    guest.apply_move(0).await.expect("guest move");
    step_until(&mut host, |c| c.phase() == Phase::Ready).await;
    assert_eq!(host.board().get(Position::TopLeft), Square::Occupied(Mark::O));
    assert_eq!(host.board(), guest.board());
}

//! The session coordinator.
//!
//! One [`Coordinator`] owns the board for whichever match the local
//! participant has open: two people on one device, a person against the
//! engine, or a networked match backed by a [`SessionRecord`]. All state is
//! mutated through `&mut self`; background work (the engine reply timer and
//! store subscriptions) only posts messages that [`Coordinator::step`]
//! drains. Every message is tagged with the match epoch, watch number or
//! reply ticket that produced it, so anything arriving after the match it
//! belongs to has been left is dropped.

mod events;
mod mode;

pub use events::{CoordinatorEvent, MoveDisposition, Rejection, StepOutcome};
pub use mode::{
    CoordinatorSettings, DEFAULT_REPLY_DELAY, ENGINE_MARK, Mode, ModeChoice, NetworkSeat, Phase,
};

use crate::error::{CoordinatorError, LedgerError, StoreError};
use crate::score::{EphemeralLedger, ScoreLedger, Scoreboard};
use crate::session::{
    Participant, ParticipantId, SessionDraft, SessionId, SessionPatch, SessionRecord,
    SessionStatus, SessionStore, Subscription, Verdict,
};
use arena_tictactoe::{
    Board, Game, Mark, Move, MoveError, Outcome, Position, STARTING_MARK, select_move,
};
use events::Inbound;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A scheduled engine reply.
struct PendingReply {
    ticket: u64,
    task: JoinHandle<()>,
}

/// State machine for one participant's matches.
pub struct Coordinator {
    me: Participant,
    store: Arc<dyn SessionStore>,
    ledger: Box<dyn ScoreLedger>,
    settings: CoordinatorSettings,
    rng: StdRng,

    game: Game,
    mode: Mode,
    scores: Scoreboard,
    // Set once the current round's result has been counted.
    round_settled: bool,
    epoch: u64,
    // Store revision of this device's latest write to the session record.
    last_write: Option<u64>,

    pending_reply: Option<PendingReply>,
    next_ticket: u64,
    session_sub: Option<Subscription>,

    invitations: Vec<SessionRecord>,
    invitation_sub: Option<Subscription>,
    invite_watch: u64,

    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    events: Option<mpsc::UnboundedSender<CoordinatorEvent>>,
}

impl Coordinator {
    /// Creates a coordinator in the lobby.
    ///
    /// Scores start at zero and are not kept anywhere; attach a ledger with
    /// [`Coordinator::with_ledger`] to keep them.
    #[instrument(skip(me, store, settings), fields(participant = %me.id()))]
    pub fn new(
        me: Participant,
        store: Arc<dyn SessionStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        let rng = match settings.seed() {
            Some(seed) => StdRng::seed_from_u64(*seed),
            None => StdRng::from_os_rng(),
        };
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        info!("Coordinator ready");

        Self {
            me,
            store,
            ledger: Box::new(EphemeralLedger),
            settings,
            rng,
            game: Game::new(),
            mode: Mode::Lobby,
            scores: Scoreboard::default(),
            round_settled: false,
            epoch: 0,
            last_write: None,
            pending_reply: None,
            next_ticket: 0,
            session_sub: None,
            invitations: Vec::new(),
            invitation_sub: None,
            invite_watch: 0,
            inbound_tx,
            inbound_rx,
            events: None,
        }
    }

    /// Sends notifications to `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Uses `ledger` for scores, loading what it holds now.
    pub fn with_ledger(mut self, ledger: Box<dyn ScoreLedger>) -> Result<Self, LedgerError> {
        self.scores = ledger.load()?;
        self.ledger = ledger;
        Ok(self)
    }

    /// Replaces the engine's random source.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    // ─────────────────────────────────────────────────────────────
    //  Accessors
    // ─────────────────────────────────────────────────────────────

    /// The local participant.
    pub fn participant(&self) -> &Participant {
        &self.me
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        self.game.board()
    }

    /// Mark to move.
    pub fn to_move(&self) -> Mark {
        self.game.to_move()
    }

    /// Outcome of the current board.
    pub fn outcome(&self) -> Outcome {
        self.game.outcome()
    }

    /// Wins counted since this coordinator was created (or loaded).
    pub fn scores(&self) -> Scoreboard {
        self.scores
    }

    /// Current mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Returns true while an engine reply is scheduled.
    pub fn has_pending_reply(&self) -> bool {
        self.pending_reply.is_some()
    }

    /// Pending invitations addressed to the local participant, as last seen.
    pub fn invitations(&self) -> &[SessionRecord] {
        &self.invitations
    }

    /// Session backing the open networked match.
    pub fn session_id(&self) -> Option<&SessionId> {
        match &self.mode {
            Mode::Networked(seat) => Some(seat.session_id()),
            _ => None,
        }
    }

    /// The other participant of the open networked match.
    pub fn opponent(&self) -> Option<&ParticipantId> {
        match &self.mode {
            Mode::Networked(seat) => Some(seat.opponent()),
            _ => None,
        }
    }

    /// Mark played from this device; `None` when both are (or no match).
    pub fn local_mark(&self) -> Option<Mark> {
        match &self.mode {
            Mode::Engine { .. } => Some(ENGINE_MARK.opponent()),
            Mode::Networked(seat) => Some(*seat.local_mark()),
            Mode::Lobby | Mode::Local => None,
        }
    }

    /// What the presentation layer should show.
    pub fn phase(&self) -> Phase {
        match &self.mode {
            Mode::Lobby => Phase::Idle,
            _ if self.game.is_over() => Phase::Terminal,
            Mode::Local => Phase::Ready,
            Mode::Engine { .. } if self.pending_reply.is_some() => Phase::EngineThinking,
            Mode::Engine { .. } => Phase::Ready,
            Mode::Networked(seat) => match seat.status() {
                SessionStatus::AwaitingAcceptance => Phase::AwaitingAcceptance,
                SessionStatus::Concluded => Phase::Closed,
                SessionStatus::Active if *seat.local_mark() == self.game.to_move() => Phase::Ready,
                SessionStatus::Active => Phase::AwaitingOpponent,
            },
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Mode transitions
    // ─────────────────────────────────────────────────────────────

    /// Opens a local or engine match from the lobby.
    #[instrument(skip(self))]
    pub fn select_mode(&mut self, choice: ModeChoice) -> Result<(), CoordinatorError> {
        if self.mode.is_open() {
            warn!(mode = ?self.mode, "Mode requested while a match is open");
            return Err(CoordinatorError::ModeActive);
        }
        let mode = match choice {
            ModeChoice::Local => Mode::Local,
            ModeChoice::Engine(difficulty) => Mode::Engine { difficulty },
        };
        self.begin_match(mode);
        Ok(())
    }

    /// Returns to the lobby.
    ///
    /// Cancels a scheduled engine reply and drops the session subscription;
    /// anything they already queued is discarded. Scores are kept.
    #[instrument(skip(self))]
    pub fn leave_match(&mut self) {
        if !self.mode.is_open() {
            return;
        }
        self.cancel_reply();
        if let Some(sub) = self.session_sub.take() {
            sub.cancel();
        }
        self.epoch += 1;
        self.mode = Mode::Lobby;
        self.game.reset();
        self.round_settled = false;
        info!(epoch = self.epoch, "Left match");
    }

    fn begin_match(&mut self, mode: Mode) {
        self.epoch += 1;
        self.game.reset();
        self.round_settled = false;
        self.last_write = None;
        info!(epoch = self.epoch, ?mode, "Match opened");
        self.mode = mode;
    }

    // ─────────────────────────────────────────────────────────────
    //  Moves
    // ─────────────────────────────────────────────────────────────

    /// Places the mark to move at `index`.
    ///
    /// Moves that are not legal from this seat change nothing and come back
    /// as [`MoveDisposition::Ignored`]. In a networked match the resulting
    /// round is published; if that fails the local move stands, a
    /// [`CoordinatorEvent::SyncFailed`] is emitted and
    /// [`CoordinatorError::Sync`] is returned.
    #[instrument(skip(self))]
    pub async fn apply_move(&mut self, index: usize) -> Result<MoveDisposition, CoordinatorError> {
        let Some(position) = Position::from_index(index) else {
            debug!(index, "Move outside the board ignored");
            return Ok(MoveDisposition::Ignored(Rejection::Illegal(
                MoveError::OutOfRange(index),
            )));
        };
        if let Some(rejection) = self.gate(position) {
            debug!(%rejection, "Move ignored");
            return Ok(MoveDisposition::Ignored(rejection));
        }
        self.commit(position).await
    }

    /// Reasons a local move at `position` must not happen.
    fn gate(&self, position: Position) -> Option<Rejection> {
        if !self.mode.is_open() {
            return Some(Rejection::NoMatch);
        }
        let mover = self.game.to_move();
        if let Err(err) = self.game.check(Move::new(mover, position)) {
            return Some(Rejection::Illegal(err));
        }
        match &self.mode {
            Mode::Engine { .. } if mover == ENGINE_MARK => Some(Rejection::NotYourTurn(mover)),
            Mode::Networked(seat) if *seat.status() != SessionStatus::Active => {
                Some(Rejection::SessionNotActive(*seat.status()))
            }
            Mode::Networked(seat) if *seat.local_mark() != mover => {
                Some(Rejection::NotYourTurn(mover))
            }
            _ => None,
        }
    }

    /// The single path every placed mark goes through.
    async fn commit(&mut self, position: Position) -> Result<MoveDisposition, CoordinatorError> {
        let mark = self.game.to_move();
        let outcome = match self.game.make_move(position) {
            Ok(outcome) => outcome,
            Err(err) => return Ok(MoveDisposition::Ignored(Rejection::Illegal(err))),
        };
        info!(%mark, %position, %outcome, "Move applied");
        self.emit(CoordinatorEvent::MoveApplied {
            mark,
            position,
            outcome,
        });
        self.settle(outcome);

        let engine_due = matches!(self.mode, Mode::Engine { .. })
            && !outcome.is_terminal()
            && self.game.to_move() == ENGINE_MARK;
        if engine_due {
            self.schedule_reply();
        }
        if matches!(self.mode, Mode::Networked(_)) {
            self.publish_round().await?;
        }
        Ok(MoveDisposition::Applied(outcome))
    }

    /// Counts a finished round once and announces it.
    fn settle(&mut self, outcome: Outcome) {
        if !outcome.is_terminal() || self.round_settled {
            return;
        }
        self.round_settled = true;
        if let Some(winner) = outcome.winner() {
            self.scores.record_win(winner);
            info!(%winner, scores = %self.scores, "Round won");
            if let Err(err) = self.ledger.save(&self.scores) {
                warn!(%err, "Could not save scores");
                self.emit(CoordinatorEvent::ScoresNotSaved {
                    message: err.message.clone(),
                });
            }
        } else {
            info!("Round drawn");
        }
        self.emit(CoordinatorEvent::Terminal(outcome));
    }

    /// Clears the board for a rematch. Scores are kept.
    ///
    /// In a networked match the cleared round is published and the session
    /// becomes active again. Does nothing on a session that was concluded
    /// without a result.
    #[instrument(skip(self))]
    pub async fn reset_match(&mut self) -> Result<(), CoordinatorError> {
        match self.phase() {
            Phase::Idle => return Err(CoordinatorError::NoMatch),
            Phase::Closed => {
                debug!("Reset ignored on a closed session");
                return Ok(());
            }
            _ => {}
        }
        self.cancel_reply();
        self.game.reset();
        self.round_settled = false;
        info!(scores = %self.scores, "Match reset");

        if let Mode::Networked(seat) = &mut self.mode {
            let status = match seat.status() {
                SessionStatus::AwaitingAcceptance => SessionStatus::AwaitingAcceptance,
                _ => SessionStatus::Active,
            };
            seat.set_status(status);
            let session_id = seat.session_id().clone();
            let patch =
                SessionPatch::round(Board::new(), STARTING_MARK, None).with_status(status);
            self.push(session_id, patch).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    //  Engine reply
    // ─────────────────────────────────────────────────────────────

    fn schedule_reply(&mut self) {
        self.cancel_reply();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let delay = *self.settings.reply_delay();
        let tx = self.inbound_tx.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(Inbound::EngineTurn { ticket }).is_err() {
                debug!(ticket, "Coordinator gone before engine reply");
            }
        });
        debug!(ticket, ?delay, "Engine reply scheduled");
        self.pending_reply = Some(PendingReply { ticket, task });
    }

    fn cancel_reply(&mut self) {
        if let Some(pending) = self.pending_reply.take() {
            pending.task.abort();
            debug!(ticket = pending.ticket, "Engine reply cancelled");
        }
    }

    async fn engine_turn(&mut self, ticket: u64) -> Result<StepOutcome, CoordinatorError> {
        if self.pending_reply.as_ref().map(|pending| pending.ticket) != Some(ticket) {
            return Ok(StepOutcome::Stale);
        }
        self.pending_reply = None;
        let Mode::Engine { difficulty } = self.mode else {
            return Ok(StepOutcome::Stale);
        };
        if self.game.is_over() || self.game.to_move() != ENGINE_MARK {
            return Ok(StepOutcome::Stale);
        }

        let Some(position) = select_move(self.game.board(), ENGINE_MARK, difficulty, &mut self.rng)
        else {
            warn!("Engine asked to move on a finished board");
            return Ok(StepOutcome::Stale);
        };
        match self.commit(position).await? {
            MoveDisposition::Applied(_) => Ok(StepOutcome::EngineMoved(position)),
            MoveDisposition::Ignored(_) => Ok(StepOutcome::Stale),
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Networked matches
    // ─────────────────────────────────────────────────────────────

    /// Invites `guest` to a networked match hosted from this device (X).
    #[instrument(skip(self))]
    pub async fn create_invitation(
        &mut self,
        guest: ParticipantId,
    ) -> Result<SessionId, CoordinatorError> {
        if self.mode.is_open() {
            return Err(CoordinatorError::ModeActive);
        }
        if guest == *self.me.id() {
            return Err(CoordinatorError::SelfInvite);
        }

        let draft = SessionDraft::new(self.me.id().clone(), guest.clone());
        let session_id = self.store.create(draft).await?;
        let seat = NetworkSeat::new(
            session_id.clone(),
            STARTING_MARK,
            guest,
            SessionStatus::AwaitingAcceptance,
        );
        self.begin_match(Mode::Networked(seat));

        if let Err(err) = self.follow_session(&session_id).await {
            warn!(%session_id, %err, "Could not follow new session");
            self.leave_match();
            return Err(err.into());
        }
        info!(%session_id, "Invitation sent");
        Ok(session_id)
    }

    /// Joins the match behind `invitation` as the guest (O).
    ///
    /// The record is re-read first. A record that is still awaiting
    /// acceptance is made active; one that was concluded in the meantime is
    /// shown as it stands and accepts no input.
    #[instrument(skip(self, invitation), fields(session_id = %invitation.id()))]
    pub async fn accept_invitation(
        &mut self,
        invitation: &SessionRecord,
    ) -> Result<(), CoordinatorError> {
        if self.mode.is_open() {
            return Err(CoordinatorError::ModeActive);
        }
        let session_id = invitation.id().clone();
        if invitation.guest() != self.me.id() {
            return Err(CoordinatorError::NotAddressed(session_id));
        }

        let record = self
            .store
            .fetch(&session_id)
            .await?
            .ok_or_else(|| CoordinatorError::SessionMissing(session_id.clone()))?;
        let mut status = *record.status();
        let mut accepted_at = None;
        if status == SessionStatus::AwaitingAcceptance {
            let revision = self
                .store
                .update(
                    &session_id,
                    SessionPatch::default().with_status(SessionStatus::Active),
                )
                .await?;
            accepted_at = Some(revision);
            status = SessionStatus::Active;
        }

        let seat = NetworkSeat::new(
            session_id.clone(),
            STARTING_MARK.opponent(),
            record.host().clone(),
            status,
        );
        self.begin_match(Mode::Networked(seat));
        self.last_write = accepted_at;
        self.game.replace(record.board().clone(), *record.turn());
        // A round decided before we joined is not ours to count.
        self.round_settled = self.game.is_over();

        if let Err(err) = self.follow_session(&session_id).await {
            warn!(%session_id, %err, "Could not follow accepted session");
            self.leave_match();
            return Err(err.into());
        }
        info!(%status, "Invitation accepted");
        Ok(())
    }

    /// Withdraws the invitation this device is hosting and returns to the
    /// lobby.
    #[instrument(skip(self))]
    pub async fn withdraw_invitation(&mut self) -> Result<(), CoordinatorError> {
        let session_id = match &self.mode {
            Mode::Networked(seat)
                if *seat.local_mark() == STARTING_MARK
                    && *seat.status() == SessionStatus::AwaitingAcceptance =>
            {
                seat.session_id().clone()
            }
            _ => return Err(CoordinatorError::NotPending),
        };
        self.store
            .update(
                &session_id,
                SessionPatch::default().with_status(SessionStatus::Concluded),
            )
            .await?;
        info!(%session_id, "Invitation withdrawn");
        self.leave_match();
        Ok(())
    }

    /// Starts tracking invitations addressed to the local participant.
    ///
    /// Replaces an earlier watch; updates arrive through [`Coordinator::step`].
    #[instrument(skip(self))]
    pub async fn watch_invitations(&mut self) -> Result<(), CoordinatorError> {
        self.invite_watch += 1;
        let watch = self.invite_watch;
        let tx = self.inbound_tx.clone();
        let sub = self
            .store
            .list_pending_for(
                self.me.id(),
                Box::new(move |records| {
                    if tx.send(Inbound::Invitations { watch, records }).is_err() {
                        debug!(watch, "Coordinator gone; invitation list dropped");
                    }
                }),
            )
            .await?;
        self.invitation_sub = Some(sub);
        debug!(watch, "Watching invitations");
        Ok(())
    }

    /// Stops tracking invitations and forgets the last list.
    pub fn stop_watching_invitations(&mut self) {
        self.invite_watch += 1;
        if let Some(sub) = self.invitation_sub.take() {
            sub.cancel();
        }
        self.invitations.clear();
    }

    async fn follow_session(&mut self, session_id: &SessionId) -> Result<(), StoreError> {
        let epoch = self.epoch;
        let tx = self.inbound_tx.clone();
        let sub = self
            .store
            .subscribe(
                session_id,
                Box::new(move |record| {
                    if tx.send(Inbound::Remote { epoch, record }).is_err() {
                        debug!(epoch, "Coordinator gone; session update dropped");
                    }
                }),
            )
            .await?;
        self.session_sub = Some(sub);
        Ok(())
    }

    /// Publishes the current round to the session record.
    async fn publish_round(&mut self) -> Result<(), CoordinatorError> {
        let Mode::Networked(seat) = &mut self.mode else {
            return Ok(());
        };
        let outcome = self.game.outcome();
        let status = if outcome.is_terminal() {
            SessionStatus::Concluded
        } else {
            SessionStatus::Active
        };
        seat.set_status(status);
        let session_id = seat.session_id().clone();
        let patch = SessionPatch::round(
            self.game.board().clone(),
            self.game.to_move(),
            Verdict::from_outcome(outcome),
        )
        .with_status(status);
        self.push(session_id, patch).await
    }

    async fn push(
        &mut self,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<(), CoordinatorError> {
        match self.store.update(&session_id, patch).await {
            Ok(revision) => {
                self.last_write = Some(revision);
                Ok(())
            }
            Err(source) => {
                warn!(%session_id, %source, "Session publish failed; local state kept");
                self.emit(CoordinatorEvent::SyncFailed {
                    session_id: session_id.clone(),
                    message: source.message.clone(),
                });
                Err(CoordinatorError::Sync { session_id, source })
            }
        }
    }

    fn remote_update(&mut self, epoch: u64, record: SessionRecord) -> StepOutcome {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "Dropping update from an earlier match");
            return StepOutcome::Stale;
        }
        let Mode::Networked(seat) = &mut self.mode else {
            return StepOutcome::Stale;
        };
        if record.id() != seat.session_id() {
            return StepOutcome::Stale;
        }
        // Last writer wins: any revision before our own latest write was
        // overwritten by it, including echoes of our earlier writes.
        if self.last_write.is_some_and(|rev| *record.revision() < rev) {
            debug!(revision = *record.revision(), "Dropping update older than our last write");
            return StepOutcome::Stale;
        }

        let status = *record.status();
        seat.set_status(status);
        self.game.replace(record.board().clone(), *record.turn());
        let outcome = self.game.outcome();
        if !outcome.is_terminal() {
            self.round_settled = false;
        }
        debug!(%status, turn = %self.game.to_move(), %outcome, "Remote state applied");
        self.settle(outcome);
        self.emit(CoordinatorEvent::RemoteApplied {
            turn: self.game.to_move(),
            outcome,
            status,
        });
        StepOutcome::RemoteApplied
    }

    fn invitations_update(&mut self, watch: u64, records: Vec<SessionRecord>) -> StepOutcome {
        if watch != self.invite_watch {
            return StepOutcome::Stale;
        }
        let count = records.len();
        debug!(count, "Invitation list updated");
        self.invitations = records.clone();
        self.emit(CoordinatorEvent::InvitationsChanged(records));
        StepOutcome::InvitationsUpdated(count)
    }

    // ─────────────────────────────────────────────────────────────
    //  Inbound processing
    // ─────────────────────────────────────────────────────────────

    /// Waits for the next background message and handles it.
    pub async fn step(&mut self) -> Result<StepOutcome, CoordinatorError> {
        match self.inbound_rx.recv().await {
            Some(message) => self.handle(message).await,
            None => Ok(StepOutcome::Stale),
        }
    }

    /// Handles one background message if one is queued.
    pub async fn try_step(&mut self) -> Result<Option<StepOutcome>, CoordinatorError> {
        match self.inbound_rx.try_recv() {
            Ok(message) => self.handle(message).await.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn handle(&mut self, message: Inbound) -> Result<StepOutcome, CoordinatorError> {
        match message {
            Inbound::EngineTurn { ticket } => self.engine_turn(ticket).await,
            Inbound::Remote { epoch, record } => Ok(self.remote_update(epoch, record)),
            Inbound::Invitations { watch, records } => Ok(self.invitations_update(watch, records)),
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Event receiver dropped");
            }
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.cancel_reply();
    }
}

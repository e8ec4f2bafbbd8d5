//! In-process session store.

use super::store::{OnChange, SessionStore, Subscription};
use super::{
    ParticipantId, SessionDraft, SessionId, SessionPatch, SessionRecord, SessionStatus,
};
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

/// Capacity of the change feed before slow subscribers start lagging.
const CHANGE_FEED_CAPACITY: usize = 256;

/// Session store kept in memory and shared by cloning.
///
/// Every write is broadcast on a change feed; subscriptions are tasks that
/// filter the feed and forward matches to their callback. Clones share the
/// same records, so two coordinators holding clones behave like two devices
/// talking to one backend.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    changes: broadcast::Sender<SessionRecord>,
    next_id: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory session store");
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            changes,
            next_id: Arc::new(AtomicU64::new(1)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes writes fail until switched back, as if the network dropped.
    ///
    /// Subscriptions stay open while offline.
    #[instrument(skip(self))]
    pub fn set_offline(&self, offline: bool) {
        info!(offline, "Toggling store connectivity");
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns a copy of every record, ordered by id.
    pub fn snapshot(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let records = self.lock()?;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, SessionRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::new("Session table lock poisoned"))
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            warn!("Write attempted while store is offline");
            return Err(StoreError::new("Session store is unreachable"));
        }
        Ok(())
    }

    fn publish(&self, record: SessionRecord) {
        if self.changes.send(record).is_err() {
            debug!("No live subscriptions for change");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Records addressed to `participant` that still await acceptance.
fn pending_for(
    records: &HashMap<SessionId, SessionRecord>,
    participant: &str,
) -> Vec<SessionRecord> {
    let mut pending: Vec<_> = records
        .values()
        .filter(|r| r.guest == participant && r.status == SessionStatus::AwaitingAcceptance)
        .cloned()
        .collect();
    pending.sort_by(|a, b| a.last_update.cmp(&b.last_update).then(a.id.cmp(&b.id)));
    pending
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    #[instrument(skip(self, draft), fields(host = %draft.host(), guest = %draft.guest()))]
    async fn create(&self, draft: SessionDraft) -> Result<SessionId, StoreError> {
        self.ensure_online()?;
        let id = format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = SessionRecord::from_draft(id.clone(), draft);
        self.lock()?.insert(id.clone(), record.clone());

        info!(session_id = %id, "Created session");
        self.publish(record);
        Ok(id)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let record = {
            let mut records = self.lock()?;
            let record = records.get_mut(id).ok_or_else(|| {
                warn!(session_id = %id, "Update for unknown session");
                StoreError::new(format!("Session {} not found", id))
            })?;
            record.apply_patch(patch);
            record.clone()
        };

        let revision = record.revision;
        debug!(session_id = %id, revision, status = %record.status, turn = %record.turn, "Session updated");
        self.publish(record);
        Ok(revision)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    #[instrument(skip(self, on_change))]
    async fn subscribe(
        &self,
        id: &SessionId,
        on_change: OnChange<SessionRecord>,
    ) -> Result<Subscription, StoreError> {
        // Subscribe before reading the snapshot so no write falls in between.
        let mut feed = self.changes.subscribe();
        let current = self.lock()?.get(id).cloned();
        let id = id.clone();

        let task = tokio::spawn(async move {
            if let Some(record) = current {
                on_change(record);
            }
            loop {
                match feed.recv().await {
                    Ok(record) if record.id == id => on_change(record),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(session_id = %id, skipped, "Session subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(move || task.abort()))
    }

    #[instrument(skip(self, on_change))]
    async fn list_pending_for(
        &self,
        participant: &ParticipantId,
        on_change: OnChange<Vec<SessionRecord>>,
    ) -> Result<Subscription, StoreError> {
        let mut feed = self.changes.subscribe();
        let initial = pending_for(&*self.lock()?, participant);
        let records = Arc::clone(&self.records);
        let participant = participant.clone();

        let task = tokio::spawn(async move {
            on_change(initial);
            loop {
                match feed.recv().await {
                    Ok(record) if record.guest == participant => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(participant = %participant, skipped, "Invitation feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
                let pending = match records.lock() {
                    Ok(table) => pending_for(&table, &participant),
                    Err(_) => {
                        warn!("Session table lock poisoned; closing invitation feed");
                        break;
                    }
                };
                on_change(pending);
            }
        });

        Ok(Subscription::new(move || task.abort()))
    }
}

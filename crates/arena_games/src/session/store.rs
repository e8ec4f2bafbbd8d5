//! The session store collaborator.

use super::{ParticipantId, SessionDraft, SessionId, SessionPatch, SessionRecord};
use crate::error::StoreError;

/// Change callback handed to a store subscription.
///
/// Called from whatever task the store delivers notifications on, so it
/// must only forward the value (for example into a channel).
pub type OnChange<T> = Box<dyn Fn(T) + Send + Sync + 'static>;

/// Asynchronous document store holding session records.
///
/// Writes are whole-field overwrites with last-writer-wins semantics; the
/// store does not validate moves or turn order.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new record in `AwaitingAcceptance` and returns its id.
    async fn create(&self, draft: SessionDraft) -> Result<SessionId, StoreError>;

    /// Overwrites the fields present in `patch` and returns the record's
    /// revision after the write.
    async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<u64, StoreError>;

    /// Reads the current record.
    async fn fetch(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Delivers the current record and then every later write to it.
    async fn subscribe(
        &self,
        id: &SessionId,
        on_change: OnChange<SessionRecord>,
    ) -> Result<Subscription, StoreError>;

    /// Delivers the list of records addressed to `participant` that are
    /// still awaiting acceptance, now and after every change to that list.
    async fn list_pending_for(
        &self,
        participant: &ParticipantId,
        on_change: OnChange<Vec<SessionRecord>>,
    ) -> Result<Subscription, StoreError>;
}

/// Handle to a live store subscription.
///
/// Dropping the handle unsubscribes; [`Subscription::cancel`] does the same
/// explicitly.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps the store-specific teardown.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribes now.
    pub fn cancel(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

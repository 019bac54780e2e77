use crate::models::RecordId;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Deletion of {held} is still in progress")]
    Busy { held: RecordId },
}

/// Proof that the holder owns the deletion slot for one id.
///
/// Not Clone, so each acquisition is released at most once.
#[must_use = "a deletion ticket must be handed back to the lock"]
#[derive(Debug, PartialEq, Eq)]
pub struct DeletionTicket {
    id: RecordId,
}

impl DeletionTicket {
    pub fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Single-slot guard for destructive actions on one surface.
///
/// At most one id is held at a time. A surface disables the delete control of
/// every row while `is_busy` and shows a busy indicator on the row for which
/// `is_locked` is true.
#[derive(Debug, Default)]
pub struct DeletionLock {
    held: Option<RecordId>,
}

impl DeletionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `id`. False when any id is already held, including `id` itself.
    pub fn acquire(&mut self, id: &RecordId) -> bool {
        if let Some(held) = &self.held {
            debug!("Refusing to lock {}: {} is held", id, held);
            return false;
        }
        self.held = Some(id.clone());
        true
    }

    /// Free the slot, returning the id that held it
    pub fn release(&mut self) -> Option<RecordId> {
        self.held.take()
    }

    /// Take the slot and get a ticket that must be passed to `unlock`
    pub fn try_lock(&mut self, id: &RecordId) -> Result<DeletionTicket, LockError> {
        match &self.held {
            Some(held) => Err(LockError::Busy { held: held.clone() }),
            None => {
                self.held = Some(id.clone());
                Ok(DeletionTicket { id: id.clone() })
            }
        }
    }

    /// Give the slot back. A ticket for an id that no longer holds the slot changes nothing.
    pub fn unlock(&mut self, ticket: DeletionTicket) {
        if self.held.as_ref() == Some(&ticket.id) {
            self.held = None;
        } else {
            warn!("Ignoring stale deletion ticket for {}", ticket.id);
        }
    }

    pub fn held(&self) -> Option<&RecordId> {
        self.held.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.held.is_some()
    }

    pub fn is_locked(&self, id: &RecordId) -> bool {
        self.held.as_ref() == Some(id)
    }
}

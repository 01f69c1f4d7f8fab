//! The participant registry: one record per connected actor.
//!
//! # Concurrency note
//!
//! `ParticipantRegistry` is a plain `HashMap`. It is owned by the single task
//! that drives every arena, so there is nothing to lock.

use std::collections::HashMap;

use gladius_protocol::ActorId;

use crate::{Participant, SessionError};

/// Process-wide map of participant records, keyed by stable actor id.
///
/// ```text
/// get_or_create() ──→ [record lives while connected] ──→ disconnect()
/// ```
///
/// Records are created on first reference; nothing has to register an actor
/// up front. A disconnect drops the record entirely, so a reconnecting actor
/// starts from a fresh one.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ActorId, Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `id`, creating it on first reference.
    pub fn get_or_create(&mut self, id: ActorId) -> &mut Participant {
        self.participants.entry(id).or_insert_with(|| {
            tracing::trace!(actor = %id, "participant record created");
            Participant::new(id)
        })
    }

    pub fn get(&self, id: ActorId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    /// Like [`get_mut`](Self::get_mut) but for callers that require the record.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] when there is no record.
    pub fn require(&mut self, id: ActorId) -> Result<&mut Participant, SessionError> {
        self.participants.get_mut(&id).ok_or(SessionError::NotFound(id))
    }

    /// Tears the record down. The caller must have taken the actor out of
    /// its arena first; the removed record is returned for that check.
    pub fn disconnect(&mut self, id: ActorId) -> Option<Participant> {
        let removed = self.participants.remove(&id);
        if removed.is_some() {
            tracing::info!(actor = %id, "participant record dropped");
        }
        removed
    }

    /// Ids of every actor whose `arena` is `name`, in id order.
    pub fn in_arena(&self, name: &str) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .participants
            .values()
            .filter(|p| p.arena.as_deref() == Some(name))
            .map(|p| p.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

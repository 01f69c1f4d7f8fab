//! Error types for the session layer.

use gladius_protocol::ActorId;

use crate::ParticipantStatus;

/// Errors that can occur while tracking participants.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No record exists for the actor. Records are created lazily, so this
    /// only happens for lookups that must not create one (e.g. after a
    /// disconnect).
    #[error("no participant record for {0}")]
    NotFound(ActorId),

    /// The status sub-state machine does not allow this step.
    #[error("{actor} cannot go from {from:?} to {to:?}")]
    IllegalTransition {
        actor: ActorId,
        from: ParticipantStatus,
        to: ParticipantStatus,
    },
}

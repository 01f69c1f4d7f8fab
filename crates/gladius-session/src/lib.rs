//! Participant tracking for Gladius.
//!
//! This crate keeps one record per connected actor:
//!
//! 1. **Status**: where the actor is in a match ([`ParticipantStatus`])
//! 2. **Participant**: the record itself (arena, team, class, saved state)
//! 3. **Registry**: the process-wide map of records ([`ParticipantRegistry`]),
//!    created lazily on first reference and torn down on disconnect
//!
//! # How it fits in the stack
//!
//! ```text
//! Arena Layer (above)  ← owns the participants currently in a match
//!     ↕
//! Session Layer (this crate)  ← knows every actor and whether they are in a match
//!     ↕
//! Protocol Layer (below)  ← provides ActorId, Location
//! ```

mod error;
mod participant;
mod registry;

pub use error::SessionError;
pub use participant::{Participant, ParticipantStatus, SavedState};
pub use registry::ParticipantRegistry;

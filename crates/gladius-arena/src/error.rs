//! Error types for the arena layer.

use std::path::PathBuf;

use gladius_protocol::{ActorId, ProtocolError};
use gladius_region::RegionError;
use gladius_session::SessionError;

use crate::ArenaPhase;

/// Errors that can occur during arena operations.
///
/// Most variants are gameplay rejections: the action is not allowed right
/// now and the caller should tell the actor why. The wrapped variants are
/// load-time or internal failures.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// The arena does not exist.
    #[error("arena '{0}' not found")]
    NotFound(String),

    #[error("arena '{0}' already exists")]
    AlreadyExists(String),

    /// The arena is locked and the actor lacks the override permission.
    #[error("arena '{0}' is locked")]
    Locked(String),

    /// The arena has no room left.
    #[error("arena '{0}' is full")]
    Full(String),

    /// Every team that could take the actor is full.
    #[error("no team in arena '{0}' has room")]
    TeamFull(String),

    /// The actor is already fighting in or watching an arena.
    #[error("{0} is already in an arena")]
    AlreadyInArena(ActorId),

    #[error("{0} is not in an arena")]
    NotInArena(ActorId),

    /// The arena's phase does not allow this operation.
    #[error("arena '{arena}' is {phase}")]
    WrongPhase { arena: String, phase: ArenaPhase },

    /// The actor is too far from the arena to join.
    #[error("{0} is too far away")]
    TooFarAway(ActorId),

    /// A goal or module vetoed the action.
    #[error("denied: {0}")]
    Denied(String),

    #[error("unknown team '{0}'")]
    UnknownTeam(String),

    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("region '{0}' already exists")]
    RegionExists(String),

    /// The arena cannot open; the listed setup items are missing.
    #[error("arena is missing: {}", .0.join(", "))]
    Incomplete(Vec<String>),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

impl ArenaError {
    /// Whether this is an expected refusal rather than a fault.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Protocol(_) | Self::Region(_) | Self::Session(_) | Self::Extension(_)
        )
    }
}

/// Errors raised by the extension registry.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// No goal, module or shape is registered under the name.
    #[error("extension '{0}' not found")]
    NotFound(String),

    /// A unit file could not be opened or lacks a required symbol.
    #[error("cannot load unit {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A unit was built against a different extension interface.
    #[error("unit {path} targets interface version {found}, expected {expected}")]
    AbiMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("extension directory unreadable: {0}")]
    Io(#[from] std::io::Error),
}

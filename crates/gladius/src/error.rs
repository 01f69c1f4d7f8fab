//! Unified error type for Gladius.

use gladius_arena::{ArenaError, ExtensionError};
use gladius_protocol::ProtocolError;
use gladius_region::RegionError;
use gladius_session::SessionError;

/// Top-level error that wraps every crate-specific error.
///
/// When using the `gladius` meta crate you deal with this single type
/// instead of importing errors from each layer; `?` converts the layer
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GladiusError {
    /// Persisted data could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A region could not be built.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// A participant record was missing or a status change was illegal.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An arena refused the request or could not be built.
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// The server loop has stopped; the request was not delivered or not
    /// answered.
    #[error("arena server is not running")]
    ServerClosed,
}

impl GladiusError {
    /// Whether this is a gameplay refusal to show to the actor rather than
    /// a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Arena(e) if e.is_rejection())
    }
}

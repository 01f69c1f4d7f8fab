//! Error types for the protocol layer.
//!
//! Each crate in Gladius defines its own error enum. A `ProtocolError`
//! always means a string or byte buffer could not be turned into one of the
//! shared types (or back).

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an arena definition failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields or wrong
    /// data types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A location string did not have the `world,x,y,z,yaw,pitch` shape.
    #[error("invalid location '{0}'")]
    InvalidLocation(String),

    /// A spawn key had no base name left after team/class extraction.
    #[error("invalid spawn key '{0}'")]
    InvalidSpawnKey(String),
}

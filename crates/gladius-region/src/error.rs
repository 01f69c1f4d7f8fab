//! Error types for the region layer.

/// Errors raised while building or loading a region.
///
/// Both variants are invariant violations: the caller aborts the load of the
/// offending region and logs it, the process carries on.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// A region must live in exactly one named world.
    #[error("region '{0}' has no world")]
    MissingWorld(String),

    /// The stored corners cannot describe a shape.
    #[error("region '{region}' has an invalid shape: {reason}")]
    InvalidShape { region: String, reason: String },
}

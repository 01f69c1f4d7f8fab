//! Identity types and persisted formats for Gladius.
//!
//! This crate defines the small vocabulary every other layer shares:
//!
//! - **Types** ([`ActorId`], [`Location`], [`BlockPos`]): who is acting and
//!   where they are.
//! - **Spawn keys** ([`SpawnKey`]): the `(team_)base(_class)` naming scheme
//!   used for teleport targets.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how arena definitions are
//!   turned into bytes for storage.
//! - **Errors** ([`ProtocolError`]): what can go wrong while parsing or
//!   encoding any of the above.
//!
//! # Architecture
//!
//! ```text
//! Region / Session / Arena layers (above) → Protocol (this crate) → bytes / strings
//! ```

mod codec;
mod error;
mod key;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use key::SpawnKey;
pub use types::{ActorId, BlockPos, Location};

//! Region geometry for Gladius.
//!
//! An arena's play area is a set of named [`Region`]s. Each region is bound
//! to one world and backed by a [`RegionShape`]; the shape answers the
//! geometric questions (containment, overlap, bounds, distance) and the
//! region adds the world check plus its flag and protection bits.
//!
//! # Key types
//!
//! - [`Solid`]: the closed set of primitives all overlap math runs on
//! - [`RegionShape`]: the shape contract extensions implement
//! - [`Cuboid`], [`Cylinder`], [`Sphere`]: the built-in shapes
//! - [`FlagSet`]: an ordinal bitmask, persisted as a single integer
//! - [`Region`] / [`RegionDefinition`]: live region and its stored form

mod error;
mod flags;
mod region;
mod shape;
mod solid;

pub use error::RegionError;
pub use flags::{FlagSet, Ordinal, RegionFlag, RegionProtection};
pub use region::{Region, RegionDefinition, RegionHeader, RegionKind, too_far_away};
pub use shape::{Cuboid, Cylinder, Direction, RegionShape, Sphere};
pub use solid::Solid;

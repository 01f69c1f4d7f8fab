//! Core identity and position types.
//!
//! These are the values that cross every layer boundary: the host hands
//! the arena an [`ActorId`] and a [`Location`], the arena hands back
//! teleport targets as [`Location`]s.

use std::fmt;
use std::str::FromStr;

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable identifier for one connected actor.
///
/// The host decides how identities are minted (account ids, connection
/// counters, ...). Gladius only requires that the id stays the same for the
/// lifetime of a connection, which is why participant records are keyed by
/// `ActorId` rather than by any live handle the host might hold.
///
/// `#[serde(transparent)]` stores the id as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A point in a named world, with a facing direction.
///
/// Persisted as the six-field string `world,x,y,z,yaw,pitch`
/// (see the [`FromStr`] and [`fmt::Display`] impls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    /// Creates a location with zero yaw and pitch.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Creates a location from a vector, keeping the given facing.
    pub fn at(world: impl Into<String>, position: DVec3, yaw: f32, pitch: f32) -> Self {
        Self {
            world: world.into(),
            x: position.x,
            y: position.y,
            z: position.z,
            yaw,
            pitch,
        }
    }

    /// The position as a vector, ignoring world and facing.
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    /// The discretized block coordinate containing this point.
    pub fn block(&self) -> BlockPos {
        BlockPos::from(self.position())
    }

    /// Returns a copy moved by `delta`, same world and facing.
    pub fn offset(&self, delta: DVec3) -> Self {
        Self::at(self.world.clone(), self.position() + delta, self.yaw, self.pitch)
    }

    /// Distance to `other`, or `None` when the worlds differ.
    pub fn distance(&self, other: &Location) -> Option<f64> {
        (self.world == other.world).then(|| self.position().distance(other.position()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.world, self.x, self.y, self.z, self.yaw, self.pitch
        )
    }
}

impl FromStr for Location {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidLocation(s.to_string());

        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [world, x, y, z, yaw, pitch] = fields.as_slice() else {
            return Err(invalid());
        };
        if world.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            world: (*world).to_string(),
            x: x.parse().map_err(|_| invalid())?,
            y: y.parse().map_err(|_| invalid())?,
            z: z.parse().map_err(|_| invalid())?,
            yaw: yaw.parse().map_err(|_| invalid())?,
            pitch: pitch.parse().map_err(|_| invalid())?,
        })
    }
}

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// Integer block coordinate.
///
/// Region flags are evaluated only when an actor's `BlockPos` changes, so
/// sub-block movement never triggers a flag evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl From<DVec3> for BlockPos {
    fn from(v: DVec3) -> Self {
        let floored = v.floor();
        Self {
            x: floored.x as i32,
            y: floored.y as i32,
            z: floored.z as i32,
        }
    }
}

impl From<BlockPos> for IVec3 {
    fn from(b: BlockPos) -> Self {
        IVec3::new(b.x, b.y, b.z)
    }
}

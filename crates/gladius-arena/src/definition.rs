//! The persisted form of an arena.

use std::fmt;

use gladius_protocol::{ActorId, Codec, ProtocolError};
use gladius_region::RegionDefinition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ArenaConfig;

/// Everything needed to rebuild an arena after a restart.
///
/// Teams live in `config.teams`. Spawns map a `(team_)base(_class)` key to
/// a `world,x,y,z,yaw,pitch` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaDefinition {
    pub name: String,
    #[serde(default)]
    pub config: ArenaConfig,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub owner: Option<ActorId>,
    /// Whether the arena had left setup.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub regions: Vec<RegionDefinition>,
    #[serde(default)]
    pub spawns: IndexMap<String, String>,
    /// Scatter radius per spawn key, for spawns that have one.
    #[serde(default)]
    pub spawn_offsets: IndexMap<String, f64>,
}

impl ArenaDefinition {
    pub fn encode(&self, codec: &impl Codec) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(self)
    }

    pub fn decode(codec: &impl Codec, bytes: &[u8]) -> Result<Self, ProtocolError> {
        codec.decode(bytes)
    }
}

/// A part of a definition that was skipped while loading.
///
/// The arena is still created; the operator should fix the definition.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadIssue {
    UnknownModule(String),
    UnknownShape { region: String, shape: String },
    InvalidRegion { region: String, reason: String },
    BadSpawn { key: String, reason: String },
    /// The arena was enabled but cannot open; it stays in setup.
    Incomplete(Vec<String>),
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModule(name) => write!(f, "unknown module '{name}'"),
            Self::UnknownShape { region, shape } => {
                write!(f, "region '{region}' uses unknown shape '{shape}'")
            }
            Self::InvalidRegion { region, reason } => write!(f, "region '{region}': {reason}"),
            Self::BadSpawn { key, reason } => write!(f, "spawn '{key}': {reason}"),
            Self::Incomplete(missing) => write!(f, "cannot open, missing {}", missing.join(", ")),
        }
    }
}

//! # Gladius
//!
//! Arena coordination for multiplayer match servers.
//!
//! Gladius takes connected actors through repeatable matches: they join a
//! lounge, ready up, count down, fight inside the arena's regions and are
//! restored when the fight is decided. Win conditions and cross-cutting
//! behaviour are extensions looked up by name; the game server itself sits
//! behind the [`Host`](gladius_arena::Host) trait.
//!
//! This crate re-exports the layers and adds the driver: an
//! [`ArenaServer`] that owns every arena on one task, fed by
//! [`ServerEvent`]s and paced by a tick clock.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gladius::prelude::*;
//!
//! // Implement Host for your game server, then:
//! // let (server, handle) = ArenaServer::builder()
//! //     .tick_rate(20)
//! //     .arena(definition)
//! //     .build(my_host)?;
//! // tokio::spawn(server.run());
//! // handle.join(ActorId(7), "pit").await?;
//! ```

mod error;
mod handler;
mod server;

pub use error::GladiusError;
pub use handler::{Reply, ServerEvent};
pub use server::{ArenaServer, ArenaServerBuilder, DEFAULT_CHANNEL_CAPACITY, ServerHandle};

pub use gladius_arena as arena;
pub use gladius_protocol as protocol;
pub use gladius_region as region;
pub use gladius_session as session;
pub use gladius_tick as tick;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything a host integration usually needs.
pub mod prelude {
    pub use crate::{ArenaServer, ArenaServerBuilder, GladiusError, ServerEvent, ServerHandle, init_tracing};

    pub use gladius_arena::{
        ArenaConfig, ArenaDefinition, ArenaError, ArenaManager, ArenaPhase, ArenaView, BlockEvent,
        BlockEventKind, DamageCause, DeathVerdict, Effect, ExtensionError, ExtensionRegistry, Goal,
        HookCx, Hooks, Host, JoinClaim, JoinPlan, LoadIssue, MemberView, Module, Registrar,
        StandardGoal, TeamConfig,
    };
    pub use gladius_protocol::{ActorId, Codec, JsonCodec, Location, SpawnKey};
    pub use gladius_region::{RegionFlag, RegionKind, RegionProtection};
    pub use gladius_session::{ParticipantStatus, SavedState};
    pub use gladius_tick::TickConfig;
}

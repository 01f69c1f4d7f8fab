//! Arena lifecycle management for Gladius.
//!
//! An arena is one repeatable match: participants join a lounge, ready up,
//! count down, fight inside the arena's regions and are restored when the
//! fight is decided. Win conditions and cross-cutting behaviour are
//! extensions looked up by name in the [`ExtensionRegistry`].
//!
//! # Key types
//!
//! - [`ArenaManager`]: creates arenas and routes actor events to them
//! - [`Arena`]: the phase and status state machines of one match
//! - [`Goal`] / [`Module`]: the extension contracts, sharing [`Hooks`]
//! - [`ExtensionRegistry`]: built-ins plus units loaded from a directory
//! - [`SpawnBook`]: spawn storage and most-specific-first selection
//! - [`CampTracker`]: per-region no-camp bookkeeping
//! - [`Host`]: everything Gladius needs from the game server
//! - [`ArenaConfig`] / [`ArenaPhase`]: settings and lifecycle
//!
//! # How it fits in the stack
//!
//! ```text
//! Server driver (above)  ← ticks the manager, routes host events
//!     ↕
//! Arena Layer (this crate)
//!     ↕
//! Region / Session / Tick layers (below)  ← geometry, participants, tasks
//! ```

mod arena;
mod config;
mod definition;
mod dispatch;
mod error;
mod flags;
mod goal;
mod host;
mod manager;
mod registry;
mod spawn;
mod team;

pub use arena::{Arena, ArenaTask, Env, TaskKind};
pub use config::{ArenaConfig, ArenaPhase, TeamConfig};
pub use definition::{ArenaDefinition, LoadIssue};
pub use error::{ArenaError, ExtensionError};
pub use flags::{CampCheck, CampTracker, FlagHit, evaluate as evaluate_flags};
pub use goal::{
    ArenaView, DeathVerdict, Effect, Goal, HookCx, Hooks, JoinClaim, JoinPlan, MemberView, Module,
    StandardGoal,
};
pub use host::{BlockEvent, BlockEventKind, DamageCause, Host, REGION_DEATH_DAMAGE};
pub use manager::{ArenaManager, Context};
pub use registry::{
    ABI_VERSION, ABI_VERSION_SYMBOL, Catalog, DylibLoader, ExtensionRegistry, GoalFactory, Loadable,
    ModuleFactory, REGISTER_SYMBOL, Registrar, ShapeFactory, UnitLoader, register_builtins,
};
pub use spawn::{Spawn, SpawnBook};
pub use team::Team;

//! The boundary between Gladius and the game server hosting it.

use gladius_protocol::{ActorId, Location};
use gladius_region::RegionProtection;
use gladius_session::SavedState;

/// Why the arena is hurting an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageCause {
    /// Standing still in a no-camp region.
    Camping,
    /// Entering a death region.
    RegionDeath,
}

/// Damage dealt by a death region. Large enough to kill anything.
pub const REGION_DEATH_DAMAGE: f64 = 1000.0;

/// World interactions an arena may veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEventKind {
    Break,
    Place,
    Craft,
    Drop,
    Pickup,
    Explode,
}

impl BlockEventKind {
    /// The region protection that forbids this interaction.
    pub fn protection(self) -> RegionProtection {
        match self {
            Self::Break => RegionProtection::Break,
            Self::Place => RegionProtection::Place,
            Self::Craft => RegionProtection::Craft,
            Self::Drop => RegionProtection::Drop,
            Self::Pickup => RegionProtection::Pickup,
            Self::Explode => RegionProtection::Tnt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockEvent {
    pub kind: BlockEventKind,
    pub location: Location,
}

/// Everything Gladius needs from the game server.
///
/// Every call is synchronous and runs on the single thread that drives the
/// arenas. Methods that act on an actor must tolerate actors that have
/// already disconnected.
pub trait Host: Send {
    /// Current location, or `None` when the actor is gone.
    fn location(&self, actor: ActorId) -> Option<Location>;

    /// Moves the actor; returns `false` when the host refused.
    fn teleport(&mut self, actor: ActorId, to: &Location) -> bool;

    fn damage(&mut self, actor: ActorId, amount: f64, cause: DamageCause);

    fn kill(&mut self, actor: ActorId);

    /// Snapshots whatever must be handed back when the actor leaves.
    fn backup(&mut self, actor: ActorId) -> SavedState;

    fn restore(&mut self, actor: ActorId, saved: SavedState);

    fn has_permission(&self, actor: ActorId, node: &str) -> bool;

    fn notify(&mut self, actor: ActorId, message: &str);

    /// Whether somebody already stands at `at`. Spawn selection skips
    /// occupied spawns while alternatives remain.
    fn is_occupied(&self, _at: &Location) -> bool {
        false
    }
}

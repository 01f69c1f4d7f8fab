//! Event routing: one [`ServerEvent`] in, one manager call out.
//!
//! Host events (movement, deaths, disconnects) are fire-and-forget. Every
//! other event carries a oneshot [`Reply`] that receives the outcome; a
//! caller that stopped waiting is not an error.

use glam::DVec3;
use gladius_arena::{
    ArenaConfig, ArenaDefinition, ArenaError, ArenaManager, ArenaView, BlockEvent, Host, LoadIssue,
};
use gladius_protocol::{ActorId, Location, SpawnKey};
use gladius_region::{RegionFlag, RegionKind, RegionProtection};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Where the outcome of a request goes.
pub type Reply<T> = oneshot::Sender<Result<T, ArenaError>>;

/// Everything the server loop reacts to.
#[derive(Debug)]
pub enum ServerEvent {
    // -- host events --------------------------------------------------------
    Moved {
        actor: ActorId,
        to: Location,
    },
    Died {
        victim: ActorId,
        killer: Option<ActorId>,
    },
    Disconnected {
        actor: ActorId,
    },

    // -- actor requests -----------------------------------------------------
    Join {
        actor: ActorId,
        arena: String,
        reply: Reply<()>,
    },
    Spectate {
        actor: ActorId,
        arena: String,
        reply: Reply<()>,
    },
    Ready {
        actor: ActorId,
        reply: Reply<()>,
    },
    ChooseClass {
        actor: ActorId,
        class: String,
        reply: Reply<()>,
    },
    Leave {
        actor: ActorId,
        reply: Reply<()>,
    },
    /// A world interaction the host wants a verdict on.
    Interact {
        actor: ActorId,
        event: BlockEvent,
        reply: Reply<()>,
    },

    // -- administration -----------------------------------------------------
    CreateArena {
        name: String,
        config: ArenaConfig,
        reply: Reply<Vec<LoadIssue>>,
    },
    LoadArena {
        definition: ArenaDefinition,
        reply: Reply<Vec<LoadIssue>>,
    },
    SaveArena {
        arena: String,
        reply: Reply<ArenaDefinition>,
    },
    RemoveArena {
        arena: String,
        reply: Reply<()>,
    },
    Open {
        arena: String,
        reply: Reply<()>,
    },
    Lock {
        arena: String,
        locked: bool,
        reply: Reply<()>,
    },
    ForceEnd {
        arena: String,
        reply: Reply<()>,
    },
    Kick {
        actor: ActorId,
        reply: Reply<()>,
    },
    SetSpawn {
        arena: String,
        key: String,
        location: Location,
        offset: Option<f64>,
        reply: Reply<SpawnKey>,
    },
    AddRegion {
        arena: String,
        region: String,
        kind: RegionKind,
        shape: String,
        world: String,
        corners: (DVec3, DVec3),
        reply: Reply<()>,
    },
    SetRegionFlag {
        arena: String,
        region: String,
        flag: RegionFlag,
        enabled: bool,
        reply: Reply<()>,
    },
    SetRegionProtection {
        arena: String,
        region: String,
        protection: RegionProtection,
        enabled: bool,
        reply: Reply<()>,
    },
    View {
        arena: String,
        reply: Reply<ArenaView>,
    },
    /// Rescans the extension directory. Running arenas keep their
    /// instances.
    ReloadExtensions {
        reply: oneshot::Sender<()>,
    },
    /// Resets every arena and stops the loop.
    Shutdown,
}

fn respond<T>(event: &'static str, reply: Reply<T>, result: Result<T, ArenaError>) {
    if let Err(e) = &result {
        if e.is_rejection() {
            debug!(event, error = %e, "request rejected");
        } else {
            warn!(event, error = %e, "request failed");
        }
    }
    if reply.send(result).is_err() {
        debug!(event, "requester stopped waiting");
    }
}

/// Routes one event to the manager.
pub(crate) fn handle_event<H: Host>(manager: &mut ArenaManager<H>, event: ServerEvent) {
    match event {
        ServerEvent::Moved { actor, to } => manager.movement(actor, &to),
        ServerEvent::Died { victim, killer } => {
            if let Err(e) = manager.death(victim, killer) {
                debug!(%victim, error = %e, "death outside any arena");
            }
        }
        ServerEvent::Disconnected { actor } => manager.disconnect(actor),

        ServerEvent::Join { actor, arena, reply } => respond("join", reply, manager.join(actor, &arena)),
        ServerEvent::Spectate { actor, arena, reply } => {
            respond("spectate", reply, manager.spectate(actor, &arena));
        }
        ServerEvent::Ready { actor, reply } => respond("ready", reply, manager.ready(actor)),
        ServerEvent::ChooseClass { actor, class, reply } => {
            respond("choose_class", reply, manager.choose_class(actor, &class));
        }
        ServerEvent::Leave { actor, reply } => respond("leave", reply, manager.leave(actor)),
        ServerEvent::Interact { actor, event, reply } => {
            respond("interact", reply, manager.block_event(actor, &event));
        }

        ServerEvent::CreateArena { name, config, reply } => {
            respond("create_arena", reply, manager.create_arena(&name, config));
        }
        ServerEvent::LoadArena { definition, reply } => {
            respond("load_arena", reply, manager.load_arena(definition));
        }
        ServerEvent::SaveArena { arena, reply } => respond("save_arena", reply, manager.save(&arena)),
        ServerEvent::RemoveArena { arena, reply } => {
            respond("remove_arena", reply, manager.remove_arena(&arena));
        }
        ServerEvent::Open { arena, reply } => respond("open", reply, manager.open(&arena)),
        ServerEvent::Lock { arena, locked, reply } => {
            respond("lock", reply, manager.lock(&arena, locked));
        }
        ServerEvent::ForceEnd { arena, reply } => respond("force_end", reply, manager.force_end(&arena)),
        ServerEvent::Kick { actor, reply } => respond("kick", reply, manager.kick(actor)),
        ServerEvent::SetSpawn {
            arena,
            key,
            location,
            offset,
            reply,
        } => respond("set_spawn", reply, manager.set_spawn(&arena, &key, location, offset)),
        ServerEvent::AddRegion {
            arena,
            region,
            kind,
            shape,
            world,
            corners,
            reply,
        } => respond(
            "add_region",
            reply,
            manager.add_region(&arena, &region, kind, &shape, &world, corners),
        ),
        ServerEvent::SetRegionFlag {
            arena,
            region,
            flag,
            enabled,
            reply,
        } => respond(
            "set_region_flag",
            reply,
            manager.set_region_flag(&arena, &region, flag, enabled),
        ),
        ServerEvent::SetRegionProtection {
            arena,
            region,
            protection,
            enabled,
            reply,
        } => respond(
            "set_region_protection",
            reply,
            manager.set_region_protection(&arena, &region, protection, enabled),
        ),
        ServerEvent::View { arena, reply } => respond("view", reply, manager.view(&arena)),
        ServerEvent::ReloadExtensions { reply } => {
            manager.registry_mut().reload();
            let _ = reply.send(());
        }
        ServerEvent::Shutdown => {
            info!("shutdown requested, resetting arenas");
            manager.reset_all();
        }
    }
}

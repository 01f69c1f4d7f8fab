//! Arena manager: creates, tracks, and routes actors to arenas.
//!
//! This is the entry point for the layers above (the server driver, a
//! command layer, the host's event listeners). It owns the [`Context`]
//! every arena shares and the [`Host`], and lends them to one arena at a
//! time through an [`Env`].

use glam::DVec3;
use gladius_protocol::{ActorId, Location, SpawnKey};
use gladius_region::{Region, RegionFlag, RegionKind, RegionProtection};
use gladius_session::ParticipantRegistry;
use gladius_tick::TaskQueue;
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::{
    Arena, ArenaConfig, ArenaDefinition, ArenaError, ArenaTask, ArenaView, BlockEvent, Env,
    ExtensionRegistry, Host, LoadIssue, SpawnBook,
};

/// State shared by every arena: the extension catalog, the participant
/// records and the task queue.
#[derive(Default)]
pub struct Context {
    pub registry: ExtensionRegistry,
    pub participants: ParticipantRegistry,
    pub tasks: TaskQueue<ArenaTask>,
}

impl Context {
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self {
            registry,
            participants: ParticipantRegistry::new(),
            tasks: TaskQueue::new(),
        }
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Manages every arena and routes actor events to the right one.
///
/// An actor is in at most one arena at a time, as fighter or spectator;
/// the participant record's `arena`/`watching` fields are the index.
pub struct ArenaManager<H: Host> {
    /// Keyed by lowercase name, in creation order.
    arenas: IndexMap<String, Arena>,
    cx: Context,
    host: H,
}

impl<H: Host> ArenaManager<H> {
    pub fn new(registry: ExtensionRegistry, host: H) -> Self {
        Self {
            arenas: IndexMap::new(),
            cx: Context::new(registry),
            host,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn arena(&self, name: &str) -> Option<&Arena> {
        self.arenas.get(&key(name))
    }

    pub fn arena_mut(&mut self, name: &str) -> Option<&mut Arena> {
        self.arenas.get_mut(&key(name))
    }

    pub fn arenas(&self) -> impl Iterator<Item = &Arena> {
        self.arenas.values()
    }

    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn participants(&self) -> &ParticipantRegistry {
        &self.cx.participants
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.cx.registry
    }

    /// For reloads. Live arenas keep the instances they already have.
    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.cx.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The arena `actor` fights in or watches.
    pub fn arena_of(&self, actor: ActorId) -> Option<&str> {
        let p = self.cx.participants.get(actor)?;
        p.arena.as_deref().or(p.watching.as_deref())
    }

    pub fn view(&self, name: &str) -> Result<ArenaView, ArenaError> {
        let arena = self
            .arena(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;
        Ok(arena.view(&self.cx.participants))
    }

    // -- routing ------------------------------------------------------------

    /// Battle regions of every running arena except `except`.
    fn busy_regions(&self, except: &str) -> Vec<Region> {
        self.arenas
            .iter()
            .filter(|(k, a)| **k != key(except) && a.phase().is_running())
            .flat_map(|(_, a)| a.battle_regions().cloned())
            .collect()
    }

    /// Lends the shared state to one arena.
    fn with_arena<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Arena, &mut Env<'_>) -> R,
    ) -> Result<R, ArenaError> {
        let busy = self.busy_regions(name);
        let arena = self
            .arenas
            .get_mut(&key(name))
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;
        let mut env = Env {
            participants: &mut self.cx.participants,
            tasks: &mut self.cx.tasks,
            host: &mut self.host,
            busy: &busy,
        };
        Ok(f(arena, &mut env))
    }

    fn with_actor_arena<R>(
        &mut self,
        actor: ActorId,
        f: impl FnOnce(&mut Arena, &mut Env<'_>) -> Result<R, ArenaError>,
    ) -> Result<R, ArenaError> {
        let name = self
            .arena_of(actor)
            .map(str::to_string)
            .ok_or(ArenaError::NotInArena(actor))?;
        self.with_arena(&name, f)?
    }

    // -- arenas -------------------------------------------------------------

    /// Creates an arena in setup.
    ///
    /// # Errors
    /// [`ArenaError::AlreadyExists`], or [`ArenaError::Extension`] when the
    /// configured goal is unknown. Unknown modules are skipped and returned.
    pub fn create_arena(&mut self, name: &str, config: ArenaConfig) -> Result<Vec<LoadIssue>, ArenaError> {
        if self.arenas.contains_key(&key(name)) {
            return Err(ArenaError::AlreadyExists(name.to_string()));
        }
        let (arena, issues) = self.build_arena(name, config)?;
        self.arenas.insert(key(name), arena);
        info!(arena = %name, "arena created");
        Ok(issues)
    }

    fn build_arena(&self, name: &str, config: ArenaConfig) -> Result<(Arena, Vec<LoadIssue>), ArenaError> {
        let goal = self.cx.registry.goal(&config.goal)?;
        let mut issues = Vec::new();
        let mut modules = Vec::new();
        for module in &config.modules {
            match self.cx.registry.module(module) {
                Ok(m) => modules.push(m),
                Err(_) => {
                    warn!(arena = %name, %module, "module skipped");
                    issues.push(LoadIssue::UnknownModule(module.clone()));
                }
            }
        }
        Ok((Arena::new(name, config, goal, modules), issues))
    }

    /// Restores everyone inside and removes the arena.
    pub fn remove_arena(&mut self, name: &str) -> Result<(), ArenaError> {
        self.with_arena(name, |arena, env| arena.reset(env))?;
        self.arenas.shift_remove(&key(name));
        info!(arena = %name, "arena removed");
        Ok(())
    }

    /// Resets every arena, handing everyone their saved state back. Used on
    /// shutdown.
    pub fn reset_all(&mut self) {
        let names: Vec<String> = self.arenas.values().map(|a| a.name().to_string()).collect();
        for name in names {
            let _ = self.with_arena(&name, |arena, env| arena.reset(env));
        }
    }

    /// Leaves setup.
    pub fn open(&mut self, name: &str) -> Result<(), ArenaError> {
        let arena = self
            .arenas
            .get_mut(&key(name))
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;
        arena.open(&self.cx.participants)
    }

    pub fn lock(&mut self, name: &str, locked: bool) -> Result<(), ArenaError> {
        self.arena_mut(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?
            .set_locked(locked);
        Ok(())
    }

    pub fn force_end(&mut self, name: &str) -> Result<(), ArenaError> {
        self.with_arena(name, |arena, env| arena.force_end(env))?
    }

    /// Parses `raw` against the arena's teams and classes and stores the
    /// spawn.
    pub fn set_spawn(
        &mut self,
        name: &str,
        raw: &str,
        location: Location,
        offset: Option<f64>,
    ) -> Result<SpawnKey, ArenaError> {
        let arena = self
            .arena_mut(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;
        let key = arena.spawn_key(raw)?;
        arena.set_spawn(key.clone(), location, offset);
        Ok(key)
    }

    pub fn remove_spawn(&mut self, name: &str, raw: &str) -> Result<bool, ArenaError> {
        let arena = self
            .arena_mut(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;
        let key = arena.spawn_key(raw)?;
        Ok(arena.remove_spawn(&key))
    }

    /// Builds a region from two selection corners with the named shape.
    pub fn add_region(
        &mut self,
        name: &str,
        region: &str,
        kind: RegionKind,
        shape: &str,
        world: &str,
        corners: (DVec3, DVec3),
    ) -> Result<(), ArenaError> {
        let shape = self.cx.registry.shape(shape, corners.0, corners.1)?;
        let region = Region::new(region, kind, world, shape)?;
        self.arena_mut(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?
            .add_region(region)
    }

    /// Turns a region flag on or off.
    pub fn set_region_flag(
        &mut self,
        name: &str,
        region: &str,
        flag: RegionFlag,
        enabled: bool,
    ) -> Result<(), ArenaError> {
        let region = self
            .arena_mut(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?
            .region_mut(region)?;
        if enabled {
            region.flags.insert(flag);
        } else {
            region.flags.remove(flag);
        }
        Ok(())
    }

    pub fn set_region_protection(
        &mut self,
        name: &str,
        region: &str,
        protection: RegionProtection,
        enabled: bool,
    ) -> Result<(), ArenaError> {
        let region = self
            .arena_mut(name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?
            .region_mut(region)?;
        if enabled {
            region.protections.insert(protection);
        } else {
            region.protections.remove(protection);
        }
        Ok(())
    }

    // -- actor events -------------------------------------------------------

    pub fn join(&mut self, actor: ActorId, name: &str) -> Result<(), ArenaError> {
        self.with_arena(name, |arena, env| arena.join(actor, env))?
    }

    pub fn spectate(&mut self, actor: ActorId, name: &str) -> Result<(), ArenaError> {
        self.with_arena(name, |arena, env| arena.spectate(actor, env))?
    }

    pub fn ready(&mut self, actor: ActorId) -> Result<(), ArenaError> {
        self.with_actor_arena(actor, |arena, env| arena.ready(actor, env))
    }

    pub fn choose_class(&mut self, actor: ActorId, class: &str) -> Result<(), ArenaError> {
        self.with_actor_arena(actor, |arena, env| arena.choose_class(actor, class, env))
    }

    pub fn leave(&mut self, actor: ActorId) -> Result<(), ArenaError> {
        self.with_actor_arena(actor, |arena, env| arena.leave(actor, env))
    }

    pub fn kick(&mut self, actor: ActorId) -> Result<(), ArenaError> {
        self.with_actor_arena(actor, |arena, env| arena.kick(actor, env))
    }

    /// The actor's connection is gone: leave any arena, then drop the
    /// participant record.
    pub fn disconnect(&mut self, actor: ActorId) {
        if self.arena_of(actor).is_some() {
            if let Err(e) = self.with_actor_arena(actor, |arena, env| arena.disconnect(actor, env)) {
                debug!(%actor, error = %e, "disconnect cleanup failed");
            }
        }
        self.cx.participants.disconnect(actor);
    }

    /// The actor moved. Ignored for actors outside any arena.
    pub fn movement(&mut self, actor: ActorId, to: &Location) {
        let _ = self.with_actor_arena(actor, |arena, env| {
            arena.movement(actor, to, env);
            Ok(())
        });
    }

    pub fn death(&mut self, victim: ActorId, killer: Option<ActorId>) -> Result<(), ArenaError> {
        self.with_actor_arena(victim, |arena, env| arena.death(victim, killer, env))
    }

    /// Whether a world interaction may go ahead. Actors outside arenas are
    /// not our business.
    pub fn block_event(&mut self, actor: ActorId, event: &BlockEvent) -> Result<(), ArenaError> {
        match self.cx.participants.get(actor).and_then(|p| p.arena.clone()) {
            Some(name) => self.with_arena(&name, |arena, env| arena.block_event(actor, event, env))?,
            None => Ok(()),
        }
    }

    /// Whether `actor` may teleport to `target`.
    ///
    /// Members may not teleport into or out of a region protecting against
    /// it, unless their telepass is set.
    pub fn allows_teleport(&self, actor: ActorId, target: &Location) -> bool {
        let Some(p) = self.cx.participants.get(actor) else {
            return true;
        };
        if p.telepass {
            return true;
        }
        let Some(arena) = p.arena.as_deref().and_then(|a| self.arena(a)) else {
            return true;
        };
        let from = self.host.location(actor);
        let protected = |at: &Location| arena.is_protected(at, RegionProtection::Teleport);
        !(protected(target) || from.as_ref().is_some_and(protected))
    }

    pub fn set_telepass(&mut self, actor: ActorId, telepass: bool) {
        self.cx.participants.get_or_create(actor).telepass = telepass;
    }

    /// Whether `actor` may take damage where they stand.
    pub fn damage_allowed(&self, actor: ActorId) -> bool {
        let Some(p) = self.cx.participants.get(actor) else {
            return true;
        };
        let Some(arena) = p.arena.as_deref().and_then(|a| self.arena(a)) else {
            return true;
        };
        if p.status() != gladius_session::ParticipantStatus::Fight {
            return false;
        }
        self.host
            .location(actor)
            .is_none_or(|at| arena.damage_allowed(&at))
    }

    /// Remaining lives of `actor`, for goals that count them.
    pub fn player_lives(&mut self, actor: ActorId) -> Option<u32> {
        let name = self.arena_of(actor)?.to_string();
        self.arena_mut(&name)?.player_lives(actor)
    }

    // -- ticking ------------------------------------------------------------

    /// Advances the task queue one tick and runs everything that came due.
    /// Returns how many tasks ran.
    pub fn tick(&mut self) -> usize {
        let due = self.cx.tasks.advance();
        let count = due.len();
        for (id, task) in due {
            if self
                .with_arena(&task.arena, |arena, env| arena.run_task(id, task.kind, env))
                .is_err()
            {
                debug!(arena = %task.arena, task = %id, "task for a removed arena dropped");
            }
        }
        count
    }

    // -- persistence --------------------------------------------------------

    pub fn save(&self, name: &str) -> Result<ArenaDefinition, ArenaError> {
        self.arena(name)
            .map(Arena::to_definition)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))
    }

    /// Rebuilds an arena from its definition.
    ///
    /// Stale references (unknown modules or shapes, malformed spawns) are
    /// skipped, logged and returned; the arena is still created.
    ///
    /// # Errors
    /// - [`ArenaError::AlreadyExists`] for a duplicate name.
    /// - [`ArenaError::Extension`] when the goal is unknown.
    /// - [`ArenaError::Region`] when a region has no world; nothing is
    ///   created.
    pub fn load_arena(&mut self, def: ArenaDefinition) -> Result<Vec<LoadIssue>, ArenaError> {
        if self.arenas.contains_key(&key(&def.name)) {
            return Err(ArenaError::AlreadyExists(def.name.clone()));
        }
        let (mut arena, mut issues) = self.build_arena(&def.name, def.config.clone())?;
        arena.set_locked(def.locked);
        arena.set_owner(def.owner);

        for region in &def.regions {
            if region.world.is_empty() {
                error!(arena = %def.name, region = %region.name, "region has no world, load aborted");
                return Err(gladius_region::RegionError::MissingWorld(region.name.clone()).into());
            }
            let shape = match self.cx.registry.shape(&region.shape, region.min, region.max) {
                Ok(shape) => shape,
                Err(_) => {
                    warn!(arena = %def.name, region = %region.name, shape = %region.shape, "region skipped");
                    issues.push(LoadIssue::UnknownShape {
                        region: region.name.clone(),
                        shape: region.shape.clone(),
                    });
                    continue;
                }
            };
            let restored = Region::from_definition(region, shape)
                .map_err(ArenaError::from)
                .and_then(|r| arena.add_region(r));
            if let Err(e) = restored {
                warn!(arena = %def.name, region = %region.name, error = %e, "region skipped");
                issues.push(LoadIssue::InvalidRegion {
                    region: region.name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let teams: Vec<String> = arena.teams().iter().map(|t| t.name.clone()).collect();
        let teams: Vec<&str> = teams.iter().map(String::as_str).collect();
        let classes: Vec<&str> = def.config.classes.iter().map(String::as_str).collect();
        let (spawns, rejected) = SpawnBook::from_maps(&def.spawns, &def.spawn_offsets, &teams, &classes);
        for (key, reason) in rejected {
            warn!(arena = %def.name, spawn = %key, error = %reason, "spawn skipped");
            issues.push(LoadIssue::BadSpawn {
                key,
                reason: reason.to_string(),
            });
        }
        arena.replace_spawns(spawns);

        if def.enabled {
            match arena.open(&self.cx.participants) {
                Ok(()) => {}
                Err(ArenaError::Incomplete(missing)) => {
                    warn!(arena = %def.name, ?missing, "arena stays in setup");
                    issues.push(LoadIssue::Incomplete(missing));
                }
                Err(e) => return Err(e),
            }
        }

        info!(arena = %def.name, issues = issues.len(), "arena loaded");
        self.arenas.insert(key(&def.name), arena);
        Ok(issues)
    }
}

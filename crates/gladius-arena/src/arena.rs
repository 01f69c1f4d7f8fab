//! The arena state machine.
//!
//! An [`Arena`] owns one match: its teams, regions, spawns, goal and
//! modules. It drives two nested state machines, the arena's
//! [`ArenaPhase`] and each member's [`ParticipantStatus`], and fans every
//! lifecycle event out to the goal first and then to the modules in
//! priority order.
//!
//! The arena never holds on to participants or the host. Every operation
//! borrows them through an [`Env`] for the length of the call, and all
//! waiting (countdowns, no-camp checks, the end delay) is expressed as
//! [`ArenaTask`]s in the shared queue. A task only acts if it is still the
//! arena's current runner for its [`TaskKind`]; anything else is stale and
//! ignored.

use std::collections::HashMap;
use std::sync::Arc;

use gladius_protocol::{ActorId, Location, SpawnKey};
use gladius_region::{Direction, Region, RegionFlag, RegionKind, RegionProtection};
use gladius_session::{ParticipantRegistry, ParticipantStatus};
use gladius_tick::{RunnerDecision, TaskId, TaskQueue};
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::dispatch::guard;
use crate::flags::{self, CampTracker};
use crate::{
    ArenaConfig, ArenaDefinition, ArenaError, ArenaPhase, ArenaView, BlockEvent, DamageCause,
    DeathVerdict, Effect, Goal, HookCx, Hooks, Host, JoinClaim, JoinPlan, MemberView, Module,
    REGION_DEATH_DAMAGE, SpawnBook, Team, TeamConfig,
};

/// Delay before a start blocked by a busy battlefield is tried again.
const RECHECK_TICKS: u64 = 100;

// ---------------------------------------------------------------------------
// Tasks and environment
// ---------------------------------------------------------------------------

/// What a deferred arena task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// The countdown ran out; start the fight.
    Countdown,
    /// Repeating no-camp check while anyone is tracked.
    NoCamp,
    /// The fight hit its time limit.
    MatchTimer,
    /// The end delay is over; restore everyone and reopen.
    Reset,
    /// Retry a start that was blocked by another arena.
    Recheck,
}

/// A task payload: which arena, and what to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaTask {
    pub arena: String,
    pub kind: TaskKind,
}

impl ArenaTask {
    pub fn new(arena: &str, kind: TaskKind) -> Self {
        Self {
            arena: arena.to_string(),
            kind,
        }
    }
}

/// What an arena operation borrows from its owner.
pub struct Env<'a> {
    pub participants: &'a mut ParticipantRegistry,
    pub tasks: &'a mut TaskQueue<ArenaTask>,
    pub host: &'a mut dyn Host,
    /// Battle regions of the other arenas that are currently running.
    pub busy: &'a [Region],
}

fn extensions<'a>(
    goal: &'a mut Box<dyn Goal>,
    modules: &'a mut [Box<dyn Module>],
) -> impl Iterator<Item = &'a mut dyn Hooks> {
    std::iter::once(goal.as_mut() as &mut dyn Hooks)
        .chain(modules.iter_mut().map(|m| m.as_mut() as &mut dyn Hooks))
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// One match instance.
pub struct Arena {
    name: String,
    config: Arc<ArenaConfig>,
    locked: bool,
    owner: Option<ActorId>,
    phase: ArenaPhase,
    round: u32,
    goal: Box<dyn Goal>,
    /// Sorted by priority; equal priorities keep their configured order.
    modules: Vec<Box<dyn Module>>,
    regions: Vec<Region>,
    teams: Vec<Team>,
    spectators: Vec<ActorId>,
    spawns: SpawnBook,
    camp: CampTracker,
    runners: HashMap<TaskKind, TaskId>,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("goal", &self.goal.name())
            .field("teams", &self.teams)
            .finish_non_exhaustive()
    }
}

impl Arena {
    /// A new arena in [`ArenaPhase::Setup`].
    pub fn new(
        name: impl Into<String>,
        config: ArenaConfig,
        goal: Box<dyn Goal>,
        modules: Vec<Box<dyn Module>>,
    ) -> Self {
        let name = name.into();
        let config = config.validated();

        let mut keyed: Vec<(i32, Box<dyn Module>)> = modules
            .into_iter()
            .map(|m| {
                let priority = guard(&name, m.name(), "priority", 0, || m.priority());
                (priority, m)
            })
            .collect();
        keyed.sort_by_key(|(priority, _)| *priority);

        Self {
            teams: config.team_configs().into_iter().map(Team::from).collect(),
            config: Arc::new(config),
            name,
            locked: false,
            owner: None,
            phase: ArenaPhase::Setup,
            round: 0,
            goal,
            modules: keyed.into_iter().map(|(_, m)| m).collect(),
            regions: Vec::new(),
            spectators: Vec::new(),
            spawns: SpawnBook::new(),
            camp: CampTracker::new(),
            runners: HashMap::new(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn phase(&self) -> ArenaPhase {
        self.phase
    }

    /// Number of fights started so far.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        info!(arena = %self.name, locked, "arena lock changed");
    }

    pub fn owner(&self) -> Option<ActorId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<ActorId>) {
        self.owner = owner;
    }

    pub fn goal_name(&self) -> &str {
        self.goal.name()
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// The team `actor` belongs to.
    pub fn team_of(&self, actor: ActorId) -> Option<&Team> {
        self.teams.iter().find(|t| t.contains(actor))
    }

    /// Every team member, in team order then join order.
    pub fn members(&self) -> Vec<ActorId> {
        self.teams
            .iter()
            .flat_map(|t| t.members().iter().copied())
            .collect()
    }

    pub fn is_member(&self, actor: ActorId) -> bool {
        self.team_of(actor).is_some()
    }

    pub fn spectators(&self) -> &[ActorId] {
        &self.spectators
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name().eq_ignore_ascii_case(name))
    }

    pub fn battle_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.kind() == RegionKind::Battle)
    }

    pub fn spawns(&self) -> &SpawnBook {
        &self.spawns
    }

    pub(crate) fn replace_spawns(&mut self, spawns: SpawnBook) {
        self.spawns = spawns;
    }

    /// Remaining lives of `actor`, for goals that count them.
    pub fn player_lives(&mut self, actor: ActorId) -> Option<u32> {
        self.goal_call("player_lives", None, |g| {
            g.player_lives().and_then(|l| l.get(&actor).copied())
        })
    }

    /// Remaining lives of `team`, for goals that count them.
    pub fn team_lives(&mut self, team: &str) -> Option<u32> {
        self.goal_call("team_lives", None, |g| {
            g.team_lives().and_then(|l| l.get(team).copied())
        })
    }

    /// A snapshot for hooks and callers.
    pub fn view(&self, participants: &ParticipantRegistry) -> ArenaView {
        let members = self
            .teams
            .iter()
            .flat_map(|team| {
                team.members().iter().map(|id| {
                    let p = participants.get(*id);
                    MemberView {
                        id: *id,
                        team: team.name.clone(),
                        status: p.map_or(ParticipantStatus::None, |p| p.status()),
                        class: p.and_then(|p| p.class.clone()),
                    }
                })
            })
            .collect();
        ArenaView {
            name: self.name.clone(),
            phase: self.phase,
            round: self.round,
            config: Arc::clone(&self.config),
            teams: self.teams.iter().map(|t| t.name.clone()).collect(),
            members,
            spectators: self.spectators.clone(),
        }
    }

    fn status_of(&self, actor: ActorId, env: &Env<'_>) -> ParticipantStatus {
        env.participants
            .get(actor)
            .map_or(ParticipantStatus::None, |p| p.status())
    }

    fn members_with(&self, env: &Env<'_>, pred: impl Fn(ParticipantStatus) -> bool) -> Vec<ActorId> {
        self.members()
            .into_iter()
            .filter(|id| pred(self.status_of(*id, env)))
            .collect()
    }

    // -- dispatch -----------------------------------------------------------

    fn goal_call<R>(&mut self, hook: &'static str, fallback: R, call: impl FnOnce(&mut dyn Goal) -> R) -> R {
        let extension = self.goal.name().to_string();
        guard(&self.name, &extension, hook, fallback, || call(self.goal.as_mut()))
    }

    /// Runs a hook on the goal, then on every module. A panic in one
    /// extension does not stop the others.
    fn each(&mut self, cx: &mut HookCx, hook: &'static str, mut call: impl FnMut(&mut dyn Hooks, &mut HookCx)) {
        for ext in extensions(&mut self.goal, &mut self.modules) {
            let extension = ext.name().to_string();
            guard(&self.name, &extension, hook, (), || call(ext, cx));
        }
    }

    /// Like [`each`](Self::each), but stops at the first veto.
    fn veto(
        &mut self,
        cx: &mut HookCx,
        hook: &'static str,
        mut call: impl FnMut(&mut dyn Hooks, &mut HookCx) -> Result<(), String>,
    ) -> Result<(), String> {
        for ext in extensions(&mut self.goal, &mut self.modules) {
            let extension = ext.name().to_string();
            guard(&self.name, &extension, hook, Ok(()), || call(ext, cx))?;
        }
        Ok(())
    }

    /// Applies the effects hooks asked for.
    fn apply(&mut self, effects: Vec<Effect>, env: &mut Env<'_>) {
        let mut end = false;
        let mut eliminated = false;
        for effect in effects {
            match effect {
                Effect::Notify { actor, message } => env.host.notify(actor, &message),
                Effect::Broadcast(message) => self.broadcast(env, &message),
                Effect::Eliminate(actor) => eliminated |= self.mark_lost(actor, env),
                Effect::Kick(actor) => {
                    if let Err(e) = self.depart(actor, env, "kicked") {
                        debug!(arena = %self.name, %actor, error = %e, "kick effect ignored");
                    }
                }
                Effect::EndMatch => end = true,
            }
        }
        if self.phase == ArenaPhase::Fight {
            if end {
                let winners = self.members_with(env, ParticipantStatus::is_fighting);
                self.finish(winners, env);
            } else if eliminated {
                self.check_end(env);
            }
        }
    }

    fn broadcast(&self, env: &mut Env<'_>, message: &str) {
        for actor in self.members().into_iter().chain(self.spectators.iter().copied()) {
            env.host.notify(actor, message);
        }
    }

    fn set_phase(&mut self, next: ArenaPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            error!(arena = %self.name, from = %self.phase, to = %next, "illegal phase transition refused");
            return false;
        }
        info!(arena = %self.name, from = %self.phase, to = %next, "phase changed");
        self.phase = next;
        true
    }

    // -- setup --------------------------------------------------------------

    /// Leaves setup once the goal has every spawn it needs.
    ///
    /// # Errors
    /// [`ArenaError::WrongPhase`] outside setup, [`ArenaError::Incomplete`]
    /// with the missing spawn names otherwise.
    pub fn open(&mut self, participants: &ParticipantRegistry) -> Result<(), ArenaError> {
        if self.phase != ArenaPhase::Setup {
            return Err(self.wrong_phase());
        }
        let view = self.view(participants);
        let keys = self.spawns.keys();
        let missing = self.goal_call("missing_spawns", Vec::new(), |g| g.missing_spawns(&view, &keys));
        if !missing.is_empty() {
            return Err(ArenaError::Incomplete(missing));
        }
        self.set_phase(ArenaPhase::Open);
        Ok(())
    }

    fn wrong_phase(&self) -> ArenaError {
        ArenaError::WrongPhase {
            arena: self.name.clone(),
            phase: self.phase,
        }
    }

    /// Parses a spawn name against this arena's teams and classes.
    pub fn spawn_key(&self, raw: &str) -> Result<SpawnKey, ArenaError> {
        let teams: Vec<&str> = self.teams.iter().map(|t| t.name.as_str()).collect();
        let classes: Vec<&str> = self.config.classes.iter().map(String::as_str).collect();
        Ok(SpawnKey::parse(raw, &teams, &classes)?)
    }

    pub fn set_spawn(&mut self, key: SpawnKey, location: Location, offset: Option<f64>) {
        info!(arena = %self.name, spawn = %key, %location, "spawn set");
        self.spawns.set(key, location, offset);
    }

    pub fn remove_spawn(&mut self, key: &SpawnKey) -> bool {
        self.spawns.remove(key).is_some()
    }

    /// # Errors
    /// [`ArenaError::RegionExists`] when the name is taken.
    pub fn add_region(&mut self, region: Region) -> Result<(), ArenaError> {
        if self.region(region.name()).is_some() {
            return Err(ArenaError::RegionExists(region.name().to_string()));
        }
        info!(arena = %self.name, region = %region.name(), kind = ?region.kind(), "region added");
        self.regions.push(region);
        Ok(())
    }

    pub fn remove_region(&mut self, name: &str) -> Result<Region, ArenaError> {
        let index = self
            .regions
            .iter()
            .position(|r| r.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ArenaError::UnknownRegion(name.to_string()))?;
        Ok(self.regions.remove(index))
    }

    /// Mutable access for flag and protection edits.
    pub fn region_mut(&mut self, name: &str) -> Result<&mut Region, ArenaError> {
        self.regions
            .iter_mut()
            .find(|r| r.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ArenaError::UnknownRegion(name.to_string()))
    }

    pub fn move_region(&mut self, name: &str, direction: Direction, amount: f64) -> Result<(), ArenaError> {
        self.region_mut(name)?.move_by(direction, amount);
        Ok(())
    }

    pub fn extend_region(&mut self, name: &str, direction: Direction, amount: f64) -> Result<(), ArenaError> {
        self.region_mut(name)?.extend(direction, amount);
        Ok(())
    }

    /// Adds a team to a teamed arena.
    pub fn add_team(&mut self, team: TeamConfig) -> Result<(), ArenaError> {
        if self.config.free_for_all {
            return Err(ArenaError::Denied("free-for-all arenas have a single team".into()));
        }
        if self.team(&team.name).is_some() {
            return Err(ArenaError::Denied(format!("team '{}' already exists", team.name)));
        }
        let config = Arc::make_mut(&mut self.config);
        if config.teams.is_empty() {
            // Materialize the implicit red/blue pair before adding to it.
            config.teams = self.teams.iter().map(|t| TeamConfig::new(t.name.clone(), t.color.clone())).collect();
        }
        config.teams.push(team.clone());
        self.teams.push(Team::from(team));
        Ok(())
    }

    pub fn to_definition(&self) -> ArenaDefinition {
        let (spawns, spawn_offsets) = self.spawns.to_maps();
        ArenaDefinition {
            name: self.name.clone(),
            config: (*self.config).clone(),
            locked: self.locked,
            owner: self.owner,
            enabled: self.phase != ArenaPhase::Setup,
            regions: self.regions.iter().map(Region::to_definition).collect(),
            spawns,
            spawn_offsets,
        }
    }

    // -- queries ------------------------------------------------------------

    /// Whether any region containing `at` has `protection`.
    pub fn is_protected(&self, at: &Location, protection: RegionProtection) -> bool {
        self.regions
            .iter()
            .any(|r| r.is_protected(protection) && r.contains(at))
    }

    /// Whether damage may be dealt at `at`.
    pub fn damage_allowed(&self, at: &Location) -> bool {
        !self
            .regions
            .iter()
            .any(|r| r.has_flag(RegionFlag::NoDamage) && r.contains(at))
    }

    /// Join-range test, see [`gladius_region::too_far_away`].
    pub fn too_far_away(&self, at: &Location) -> bool {
        let battle: Vec<&Region> = self.battle_regions().collect();
        let center = self.spawns.center();
        gladius_region::too_far_away(&battle, center.as_ref(), self.config.join_radius, at)
    }

    // -- join / ready ---------------------------------------------------------

    /// Adds `actor` to the arena.
    ///
    /// Rejections come first and in a fixed order: already busy, wrong
    /// phase, locked, out of range, capacity, then the goal's and modules'
    /// `check_join`. Only then is the join offered to the modules; the
    /// first to claim it decides the plan, otherwise the default applies.
    pub fn join(&mut self, actor: ActorId, env: &mut Env<'_>) -> Result<(), ArenaError> {
        if env.participants.get(actor).is_some_and(|p| p.is_busy()) {
            return Err(ArenaError::AlreadyInArena(actor));
        }
        let late = self.config.join_to_battle && self.phase == ArenaPhase::Fight;
        if !self.phase.is_joinable() && !late {
            return Err(self.wrong_phase());
        }
        if self.locked && !env.host.has_permission(actor, &self.config.override_permission) {
            return Err(ArenaError::Locked(self.name.clone()));
        }
        if self.config.join_radius > 0.0 {
            if let Some(at) = env.host.location(actor) {
                if self.too_far_away(&at) {
                    return Err(ArenaError::TooFarAway(actor));
                }
            }
        }

        let mut cx = HookCx::new(self.view(env.participants));
        let view = cx.view.clone();
        self.goal_call("check_capacity", Ok(()), |g| g.check_capacity(&view))?;
        if let Err(reason) = self.veto(&mut cx, "check_join", |ext, cx| ext.check_join(cx, actor)) {
            debug!(arena = %self.name, %actor, %reason, "join vetoed");
            self.apply(cx.into_effects(), env);
            return Err(ArenaError::Denied(reason));
        }

        let plan = self.claim_join(&mut cx, actor).unwrap_or_default();
        let team = match &plan.team {
            Some(name) => self
                .team(name)
                .map(|t| t.name.clone())
                .ok_or_else(|| ArenaError::UnknownTeam(name.clone()))?,
            None => self
                .pick_team()
                .ok_or_else(|| ArenaError::TeamFull(self.name.clone()))?,
        };
        let to_battle = plan.to_battle || self.config.join_to_battle;
        let spawn = plan
            .spawn
            .clone()
            .unwrap_or_else(|| if to_battle { "spawn" } else { "lounge" }.to_string());

        let saved = env.host.backup(actor);
        let participant = env.participants.get_or_create(actor);
        if to_battle && self.phase == ArenaPhase::Fight {
            participant.set_status(ParticipantStatus::Fight)?;
        } else {
            participant.set_status(ParticipantStatus::Lounge)?;
            if to_battle {
                participant.set_status(ParticipantStatus::Ready)?;
            }
        }
        participant.saved = Some(saved);
        participant.arena = Some(self.name.clone());
        participant.team = Some(team.clone());
        if let Some(t) = self.teams.iter_mut().find(|t| t.name == team) {
            t.add(actor);
        }
        info!(arena = %self.name, %actor, %team, to_battle, "participant joined");

        self.send_to_spawn(actor, &spawn, env);

        let mut effects = cx.into_effects();
        let mut cx = HookCx::new(self.view(env.participants));
        self.each(&mut cx, "on_join", |ext, cx| ext.on_join(cx, actor));
        effects.extend(cx.into_effects());
        self.apply(effects, env);

        self.try_countdown(env);
        Ok(())
    }

    fn claim_join(&mut self, cx: &mut HookCx, actor: ActorId) -> Option<JoinPlan> {
        for module in &mut self.modules {
            let extension = module.name().to_string();
            let claim = guard(&self.name, &extension, "handle_join", JoinClaim::Pass, || {
                module.handle_join(cx, actor)
            });
            if claim == JoinClaim::Claim {
                debug!(arena = %self.name, %actor, module = %extension, "join claimed");
                return Some(guard(&self.name, &extension, "commit_join", JoinPlan::default(), || {
                    module.commit_join(cx, actor)
                }));
            }
        }
        None
    }

    /// The smallest team with room; ties go to the earlier team.
    fn pick_team(&self) -> Option<String> {
        let cap = self.config.max_per_team;
        self.teams
            .iter()
            .filter(|t| cap == 0 || t.len() < cap)
            .min_by_key(|t| t.len())
            .map(|t| t.name.clone())
    }

    /// Marks a lounging member as ready.
    pub fn ready(&mut self, actor: ActorId, env: &mut Env<'_>) -> Result<(), ArenaError> {
        if !self.is_member(actor) {
            return Err(ArenaError::NotInArena(actor));
        }
        if !self.phase.is_joinable() {
            return Err(self.wrong_phase());
        }
        env.participants
            .require(actor)?
            .set_status(ParticipantStatus::Ready)?;
        info!(arena = %self.name, %actor, "participant ready");
        self.try_countdown(env);
        Ok(())
    }

    /// Picks a class while waiting in the lounge.
    pub fn choose_class(&mut self, actor: ActorId, class: &str, env: &mut Env<'_>) -> Result<(), ArenaError> {
        if !self.is_member(actor) {
            return Err(ArenaError::NotInArena(actor));
        }
        let participant = env.participants.require(actor)?;
        if !participant.status().is_waiting() {
            return Err(self.wrong_phase());
        }
        let class = self
            .config
            .class(class)
            .ok_or_else(|| ArenaError::UnknownClass(class.to_string()))?;
        participant.class = Some(class.to_string());
        debug!(arena = %self.name, %actor, class, "class chosen");
        Ok(())
    }

    /// Adds `actor` as a spectator.
    pub fn spectate(&mut self, actor: ActorId, env: &mut Env<'_>) -> Result<(), ArenaError> {
        if env.participants.get(actor).is_some_and(|p| p.is_busy()) {
            return Err(ArenaError::AlreadyInArena(actor));
        }
        if self.phase == ArenaPhase::Setup {
            return Err(self.wrong_phase());
        }

        let mut cx = HookCx::new(self.view(env.participants));
        let mut spawn = None;
        for module in &mut self.modules {
            let extension = module.name().to_string();
            let claim = guard(&self.name, &extension, "handle_spectate", JoinClaim::Pass, || {
                module.handle_spectate(&mut cx, actor)
            });
            if claim == JoinClaim::Claim {
                spawn = guard(&self.name, &extension, "commit_spectate", None, || {
                    module.commit_spectate(&mut cx, actor)
                });
                break;
            }
        }

        let saved = env.host.backup(actor);
        let participant = env.participants.get_or_create(actor);
        participant.set_status(ParticipantStatus::Watch)?;
        participant.saved = Some(saved);
        participant.watching = Some(self.name.clone());
        self.spectators.push(actor);
        info!(arena = %self.name, %actor, "spectator joined");

        let spawn = spawn.unwrap_or_else(|| "spectator".to_string());
        self.send_to_spawn(actor, &spawn, env);
        self.apply(cx.into_effects(), env);
        Ok(())
    }

    // -- teleports ------------------------------------------------------------

    /// Teleports `actor` to the best free spawn for `base`.
    fn send_to_spawn(&self, actor: ActorId, base: &str, env: &mut Env<'_>) -> bool {
        let (team, class) = env
            .participants
            .get(actor)
            .map(|p| (p.team.clone(), p.class.clone()))
            .unwrap_or_default();
        let candidates = self.spawns.select(team.as_deref(), class.as_deref(), base);

        let mut occupied = Vec::new();
        for spawn in candidates {
            let target = spawn.resolve(self.config.spawn_offset);
            if env.host.is_occupied(&target) {
                occupied.push(target);
                continue;
            }
            if self.teleport(actor, &target, env) {
                return true;
            }
        }
        // Every spawn is taken: share one rather than strand the actor.
        if let Some(target) = occupied.first() {
            if self.teleport(actor, target, env) {
                return true;
            }
        }
        warn!(arena = %self.name, %actor, spawn = base, "no usable spawn");
        false
    }

    fn teleport(&self, actor: ActorId, target: &Location, env: &mut Env<'_>) -> bool {
        if !env.host.teleport(actor, target) {
            return false;
        }
        if let Some(p) = env.participants.get_mut(actor) {
            p.last_location = Some(target.clone());
        }
        true
    }

    // -- countdown / start ----------------------------------------------------

    /// Starts the countdown if every start guard passes. An unmet guard is
    /// announced to the arena and nothing changes.
    pub fn try_countdown(&mut self, env: &mut Env<'_>) -> bool {
        if self.phase != ArenaPhase::Open {
            return false;
        }
        if let Err(reason) = self.start_guard(env) {
            debug!(arena = %self.name, %reason, "not starting yet");
            self.broadcast(env, &reason);
            return false;
        }
        if !self.set_phase(ArenaPhase::CountingDown) {
            return false;
        }
        let id = env
            .tasks
            .schedule_once(self.config.countdown_ticks, ArenaTask::new(&self.name, TaskKind::Countdown));
        self.runners.insert(TaskKind::Countdown, id);
        let message = format!("The fight starts in {} ticks", self.config.countdown_ticks);
        self.broadcast(env, &message);
        true
    }

    fn start_guard(&mut self, env: &mut Env<'_>) -> Result<(), String> {
        let waiting = self.members_with(env, ParticipantStatus::is_waiting);
        let ready = self
            .members_with(env, |s| s == ParticipantStatus::Ready)
            .len();
        let min = self.config.min_players;
        if waiting.len() < min {
            return Err(format!("Waiting for players ({}/{min})", waiting.len()));
        }
        if ready < min || (ready as f64) < self.config.ready_ratio * waiting.len() as f64 {
            return Err(format!("{ready}/{} ready", waiting.len()));
        }

        if !self.config.free_for_all {
            let sizes: Vec<usize> = self
                .teams
                .iter()
                .map(|t| t.members().iter().filter(|id| waiting.contains(id)).count())
                .filter(|n| *n > 0)
                .collect();
            if sizes.len() < 2 {
                return Err("At least two teams need players".to_string());
            }
            if self.config.even_teams && sizes.iter().any(|n| *n != sizes[0]) {
                return Err("Teams are uneven".to_string());
            }
        }

        if self.config.check_overlap {
            let blocked = self
                .battle_regions()
                .find(|ours| env.busy.iter().any(|theirs| theirs.overlaps(ours)))
                .map(|r| r.name().to_string());
            if let Some(region) = blocked {
                if !self.runners.contains_key(&TaskKind::Recheck) {
                    let id = env
                        .tasks
                        .schedule_once(RECHECK_TICKS, ArenaTask::new(&self.name, TaskKind::Recheck));
                    self.runners.insert(TaskKind::Recheck, id);
                }
                return Err(format!("Battlefield '{region}' is in use by another arena"));
            }
        }

        let mut cx = HookCx::new(self.view(env.participants));
        let verdict = self.veto(&mut cx, "check_start", |ext, cx| ext.check_start(cx));
        self.apply(cx.into_effects(), env);
        verdict
    }

    fn countdown_expired(&mut self, env: &mut Env<'_>) {
        if self.phase != ArenaPhase::CountingDown {
            return;
        }
        let waiting = self.members_with(env, ParticipantStatus::is_waiting).len();
        if waiting < self.config.min_players {
            self.set_phase(ArenaPhase::Open);
            self.broadcast(env, "Countdown cancelled");
            return;
        }
        self.start_fight(env);
    }

    fn start_fight(&mut self, env: &mut Env<'_>) {
        if !self.set_phase(ArenaPhase::Fight) {
            return;
        }
        self.round += 1;

        let fighters = self.members_with(env, ParticipantStatus::is_waiting);
        for actor in &fighters {
            if let Some(p) = env.participants.get_mut(*actor) {
                if let Err(e) = p.set_status(ParticipantStatus::Fight) {
                    error!(arena = %self.name, %actor, error = %e, "cannot start fighter");
                    continue;
                }
            }
            self.send_to_spawn(*actor, "spawn", env);
        }
        info!(arena = %self.name, round = self.round, fighters = fighters.len(), "fight started");

        let mut cx = HookCx::new(self.view(env.participants));
        self.each(&mut cx, "on_start", |ext, cx| ext.on_start(cx));

        if self.config.match_duration_ticks > 0 {
            let id = env.tasks.schedule_once(
                self.config.match_duration_ticks,
                ArenaTask::new(&self.name, TaskKind::MatchTimer),
            );
            self.runners.insert(TaskKind::MatchTimer, id);
        }
        self.apply(cx.into_effects(), env);
    }

    // -- departures -----------------------------------------------------------

    /// The actor leaves on their own.
    pub fn leave(&mut self, actor: ActorId, env: &mut Env<'_>) -> Result<(), ArenaError> {
        self.depart(actor, env, "left")
    }

    pub fn kick(&mut self, actor: ActorId, env: &mut Env<'_>) -> Result<(), ArenaError> {
        self.depart(actor, env, "kicked")
    }

    pub fn disconnect(&mut self, actor: ActorId, env: &mut Env<'_>) -> Result<(), ArenaError> {
        self.depart(actor, env, "disconnected")
    }

    fn depart(&mut self, actor: ActorId, env: &mut Env<'_>, reason: &'static str) -> Result<(), ArenaError> {
        if let Some(index) = self.spectators.iter().position(|s| *s == actor) {
            self.spectators.remove(index);
            self.restore(actor, env);
            info!(arena = %self.name, %actor, reason, "spectator left");
            return Ok(());
        }

        let team = self
            .teams
            .iter_mut()
            .find(|t| t.contains(actor))
            .ok_or(ArenaError::NotInArena(actor))?;
        team.remove(actor);
        let was_fighting = self.status_of(actor, env).is_fighting();
        self.camp.forget_actor(actor);
        self.restore(actor, env);
        info!(arena = %self.name, %actor, reason, "participant left");

        let mut cx = HookCx::new(self.view(env.participants));
        self.each(&mut cx, "on_leave", |ext, cx| ext.on_leave(cx, actor));
        self.apply(cx.into_effects(), env);

        match self.phase {
            ArenaPhase::CountingDown => {
                let waiting = self.members_with(env, ParticipantStatus::is_waiting).len();
                if waiting < self.config.min_players {
                    if let Some(id) = self.runners.remove(&TaskKind::Countdown) {
                        env.tasks.cancel(id);
                    }
                    self.set_phase(ArenaPhase::Open);
                    self.broadcast(env, "Countdown cancelled");
                }
            }
            ArenaPhase::Fight if was_fighting => self.check_end(env),
            _ => {}
        }
        self.update_nocamp_runner(env);
        Ok(())
    }

    /// Hands the saved state back and clears the participant record.
    fn restore(&self, actor: ActorId, env: &mut Env<'_>) {
        let Some(p) = env.participants.get_mut(actor) else {
            return;
        };
        if let Some(saved) = p.reset() {
            env.host.restore(actor, saved);
        }
    }

    // -- death ------------------------------------------------------------------

    /// A fighter died.
    ///
    /// The goal decides first; modules see the death afterwards. Deaths of
    /// members that are not fighting are ignored.
    pub fn death(
        &mut self,
        victim: ActorId,
        killer: Option<ActorId>,
        env: &mut Env<'_>,
    ) -> Result<(), ArenaError> {
        if !self.is_member(victim) {
            return Err(ArenaError::NotInArena(victim));
        }
        if self.phase != ArenaPhase::Fight || self.status_of(victim, env) != ParticipantStatus::Fight {
            return Ok(());
        }
        env.participants.require(victim)?.set_status(ParticipantStatus::Dead)?;

        let mut cx = HookCx::new(self.view(env.participants));
        let verdict = self.goal_call("check_death", DeathVerdict::Unhandled, |g| {
            g.check_death(&mut cx, victim, killer)
        });
        let killer_field = killer.map(|k| k.to_string());
        info!(arena = %self.name, %victim, killer = ?killer_field, ?verdict, "fighter died");

        match verdict {
            DeathVerdict::Respawn => {
                env.participants.require(victim)?.set_status(ParticipantStatus::Fight)?;
                self.send_to_spawn(victim, "spawn", env);
            }
            DeathVerdict::Eliminate | DeathVerdict::Unhandled => {
                let next = if self.config.spectate_on_death {
                    ParticipantStatus::Watch
                } else {
                    ParticipantStatus::Lost
                };
                env.participants.require(victim)?.set_status(next)?;
                self.camp.forget_actor(victim);
                if next == ParticipantStatus::Watch {
                    self.send_to_spawn(victim, "spectator", env);
                }
            }
        }

        cx.view = self.view(env.participants);
        self.each(&mut cx, "on_death", |ext, cx| ext.on_death(cx, victim, killer));
        self.apply(cx.into_effects(), env);
        self.check_end(env);
        self.update_nocamp_runner(env);
        Ok(())
    }

    fn mark_lost(&mut self, actor: ActorId, env: &mut Env<'_>) -> bool {
        let Some(p) = env.participants.get_mut(actor) else {
            return false;
        };
        if !p.status().is_fighting() || p.set_status(ParticipantStatus::Lost).is_err() {
            return false;
        }
        self.camp.forget_actor(actor);
        true
    }

    /// Kills a fighter and marks them lost.
    fn knock_out(&mut self, actor: ActorId, env: &mut Env<'_>) {
        if self.mark_lost(actor, env) {
            env.host.kill(actor);
        }
    }

    // -- movement and flags ---------------------------------------------------

    /// A member moved. Flags are only evaluated when the block changes.
    pub fn movement(&mut self, actor: ActorId, to: &Location, env: &mut Env<'_>) {
        let Some(p) = env.participants.get_mut(actor) else {
            return;
        };
        let block_changed = p
            .last_location
            .as_ref()
            .is_none_or(|last| last.world != to.world || last.block() != to.block());
        p.last_location = Some(to.clone());
        if !block_changed || p.status() != ParticipantStatus::Fight || self.phase != ArenaPhase::Fight {
            return;
        }

        let mut camping = false;
        let mut terminal = None;
        for region in &self.regions {
            let hit = flags::evaluate(region, actor, to, &mut self.camp, self.config.nocamp_radius);
            camping |= hit.camping;
            if terminal.is_none() {
                terminal = hit.terminal.map(|flag| (flag, region.name().to_string()));
            }
        }

        if camping {
            env.host.damage(actor, self.config.nocamp_damage, DamageCause::Camping);
        }
        if let Some((flag, region)) = terminal {
            debug!(arena = %self.name, %actor, %region, ?flag, "region flag fired");
            match flag {
                RegionFlag::Death => self.death_zone(actor, env),
                RegionFlag::Win => self.win_zone(actor, env),
                RegionFlag::Lose => self.lose_zone(actor, env),
                RegionFlag::NoCamp | RegionFlag::NoDamage => {}
            }
        }
        self.update_nocamp_runner(env);
    }

    /// A death region: one life is granted before the lethal damage, so the
    /// death it causes does not cost a life.
    fn death_zone(&mut self, actor: ActorId, env: &mut Env<'_>) {
        let team = self.team_of(actor).map(|t| t.name.clone());
        self.goal_call("lives", (), |g| {
            if let Some(lives) = g.player_lives() {
                if let Some(left) = lives.get_mut(&actor) {
                    *left += 1;
                }
            } else if let (Some(lives), Some(team)) = (g.team_lives(), team) {
                if let Some(left) = lives.get_mut(&team) {
                    *left += 1;
                }
            }
        });
        env.host.damage(actor, REGION_DEATH_DAMAGE, DamageCause::RegionDeath);
    }

    /// The fighters on the entrant's side: the entrant alone in a
    /// free-for-all, the entrant's team otherwise.
    fn same_side(&self, actor: ActorId, other: ActorId) -> bool {
        if self.config.free_for_all {
            return actor == other;
        }
        match (self.team_of(actor), self.team_of(other)) {
            (Some(a), Some(b)) => a.name == b.name,
            _ => false,
        }
    }

    fn win_zone(&mut self, actor: ActorId, env: &mut Env<'_>) {
        let losers: Vec<ActorId> = self
            .members_with(env, |s| s == ParticipantStatus::Fight)
            .into_iter()
            .filter(|other| !self.same_side(actor, *other))
            .collect();
        info!(arena = %self.name, %actor, losers = losers.len(), "win region reached");
        for loser in losers {
            self.knock_out(loser, env);
        }
        self.check_end(env);
    }

    fn lose_zone(&mut self, actor: ActorId, env: &mut Env<'_>) {
        let losers: Vec<ActorId> = self
            .members_with(env, |s| s == ParticipantStatus::Fight)
            .into_iter()
            .filter(|other| self.same_side(actor, *other))
            .collect();
        info!(arena = %self.name, %actor, losers = losers.len(), "lose region reached");
        for loser in losers {
            self.knock_out(loser, env);
        }
        self.check_end(env);
    }

    fn update_nocamp_runner(&mut self, env: &mut Env<'_>) {
        let running = self.runners.get(&TaskKind::NoCamp).copied();
        match RunnerDecision::decide(self.camp.tracked(), running.is_some()) {
            RunnerDecision::Start => {
                let every = self.config.nocamp_interval_ticks;
                let id = env
                    .tasks
                    .schedule_repeating(every, every, ArenaTask::new(&self.name, TaskKind::NoCamp));
                self.runners.insert(TaskKind::NoCamp, id);
                debug!(arena = %self.name, task = %id, "no-camp runner started");
            }
            RunnerDecision::Stop => {
                if let Some(id) = self.runners.remove(&TaskKind::NoCamp) {
                    env.tasks.cancel(id);
                    debug!(arena = %self.name, task = %id, "no-camp runner stopped");
                }
            }
            RunnerDecision::Keep => {}
        }
    }

    /// One pass of the no-camp runner over every tracked fighter.
    fn nocamp_pass(&mut self, env: &mut Env<'_>) {
        for (region_name, actor) in self.camp.entries() {
            let fighting = self.status_of(actor, env) == ParticipantStatus::Fight;
            let here = env.host.location(actor);
            let region = self.regions.iter().find(|r| r.name() == region_name);
            let (Some(region), Some(at), true) = (region, here, fighting) else {
                self.camp.forget(&region_name, actor);
                continue;
            };
            if !region.contains(&at) {
                self.camp.forget(&region_name, actor);
                continue;
            }
            let check = self.camp.observe(&region_name, actor, at.position(), self.config.nocamp_radius);
            if check == flags::CampCheck::Camping {
                env.host.damage(actor, self.config.nocamp_damage, DamageCause::Camping);
            }
        }
        self.update_nocamp_runner(env);
    }

    // -- ending -----------------------------------------------------------------

    fn check_end(&mut self, env: &mut Env<'_>) {
        if self.phase != ArenaPhase::Fight {
            return;
        }
        let view = self.view(env.participants);
        if self.goal_call("check_end", false, |g| g.check_end(&view)) {
            let winners = view.fighters().map(|m| m.id).collect();
            self.finish(winners, env);
        }
    }

    /// Ends a running fight without winners.
    pub fn force_end(&mut self, env: &mut Env<'_>) -> Result<(), ArenaError> {
        match self.phase {
            ArenaPhase::Fight => {
                info!(arena = %self.name, "fight ended by force");
                self.finish(Vec::new(), env);
                Ok(())
            }
            ArenaPhase::CountingDown => {
                if let Some(id) = self.runners.remove(&TaskKind::Countdown) {
                    env.tasks.cancel(id);
                }
                self.set_phase(ArenaPhase::Open);
                Ok(())
            }
            _ => Err(self.wrong_phase()),
        }
    }

    fn match_timer_expired(&mut self, env: &mut Env<'_>) {
        if self.phase != ArenaPhase::Fight {
            return;
        }
        let view = self.view(env.participants);
        let scores = self.goal_call("timed_scores", IndexMap::new(), |g| g.timed_scores(&view));
        let fighters: Vec<ActorId> = view.fighters().map(|m| m.id).collect();
        let score = |id: &ActorId| scores.get(id).copied().unwrap_or(0);
        let best = fighters.iter().map(score).max();

        let (winners, losers): (Vec<ActorId>, Vec<ActorId>) =
            fighters.into_iter().partition(|id| Some(score(id)) == best);
        for loser in losers {
            self.mark_lost(loser, env);
        }
        info!(arena = %self.name, winners = winners.len(), "match timer expired");
        self.finish(winners, env);
    }

    /// `Fight → Ending`: stop runners, tell extensions, then reset now or
    /// after the end delay.
    fn finish(&mut self, winners: Vec<ActorId>, env: &mut Env<'_>) {
        if !self.set_phase(ArenaPhase::Ending) {
            return;
        }
        for (_, id) in self.runners.drain() {
            env.tasks.cancel(id);
        }
        self.camp.clear();
        info!(arena = %self.name, round = self.round, winners = ?winners, "fight ended");

        let mut cx = HookCx::new(self.view(env.participants));
        self.each(&mut cx, "on_end", |ext, cx| ext.on_end(cx, &winners));
        self.apply(cx.into_effects(), env);

        if self.config.end_delay_ticks == 0 {
            self.reset(env);
        } else {
            let id = env
                .tasks
                .schedule_once(self.config.end_delay_ticks, ArenaTask::new(&self.name, TaskKind::Reset));
            self.runners.insert(TaskKind::Reset, id);
        }
    }

    /// Restores and removes everyone, clears per-match state, cancels every
    /// task of this arena and reopens it.
    pub fn reset(&mut self, env: &mut Env<'_>) {
        let everyone: Vec<ActorId> = self
            .members()
            .into_iter()
            .chain(self.spectators.iter().copied())
            .collect();
        for actor in &everyone {
            self.restore(*actor, env);
        }
        self.teams.iter_mut().for_each(Team::clear);
        self.spectators.clear();
        self.camp.clear();

        for ext in extensions(&mut self.goal, &mut self.modules) {
            let extension = ext.name().to_string();
            guard(&self.name, &extension, "reset", (), || ext.reset());
        }

        let name = self.name.clone();
        let cancelled = env.tasks.cancel_where(|task| task.arena == name);
        self.runners.clear();
        if self.phase != ArenaPhase::Setup {
            self.phase = ArenaPhase::Open;
        }
        info!(arena = %self.name, restored = everyone.len(), cancelled, "arena reset");
    }

    // -- tasks ------------------------------------------------------------------

    /// Runs a task that came due. Stale tasks are ignored.
    pub fn run_task(&mut self, id: TaskId, kind: TaskKind, env: &mut Env<'_>) {
        if self.runners.get(&kind) != Some(&id) {
            debug!(arena = %self.name, task = %id, ?kind, "stale task ignored");
            return;
        }
        if kind != TaskKind::NoCamp {
            self.runners.remove(&kind);
        }
        match kind {
            TaskKind::Countdown => self.countdown_expired(env),
            TaskKind::NoCamp => self.nocamp_pass(env),
            TaskKind::MatchTimer => self.match_timer_expired(env),
            TaskKind::Reset => self.reset(env),
            TaskKind::Recheck => {
                self.try_countdown(env);
            }
        }
    }

    // -- world events -----------------------------------------------------------

    /// A member interacts with the world. Region protections are checked
    /// first, then the goal and modules may veto.
    pub fn block_event(&mut self, actor: ActorId, event: &BlockEvent, env: &mut Env<'_>) -> Result<(), ArenaError> {
        if !self.is_member(actor) {
            return Err(ArenaError::NotInArena(actor));
        }
        let protection = event.kind.protection();
        if self.is_protected(&event.location, protection) {
            return Err(ArenaError::Denied(format!("{protection:?} is protected here")));
        }
        let mut cx = HookCx::new(self.view(env.participants));
        let verdict = self.veto(&mut cx, "on_block_event", |ext, cx| ext.on_block_event(cx, actor, event));
        self.apply(cx.into_effects(), env);
        verdict.map_err(ArenaError::Denied)
    }
}

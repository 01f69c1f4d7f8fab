//! Integration tests for the arena system.
//!
//! Every test drives an `ArenaManager` through its public API against a
//! `RecordingHost` that remembers every call Gladius made.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;
use gladius_arena::{
    ArenaConfig, ArenaError, ArenaManager, ArenaPhase, ArenaView, BlockEvent, BlockEventKind,
    DamageCause, DeathVerdict, ExtensionRegistry, Goal, HookCx, Hooks, Host, LoadIssue, Module,
    REGION_DEATH_DAMAGE, TeamConfig,
};
use gladius_protocol::{ActorId, Location};
use gladius_region::{Direction, RegionFlag, RegionKind, RegionProtection};
use gladius_session::{ParticipantStatus, SavedState};
use indexmap::IndexMap;

const WORLD: &str = "arena";
const A1: ActorId = ActorId(1);
const A2: ActorId = ActorId(2);
const A3: ActorId = ActorId(3);

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Teleport(ActorId, Location),
    Damage(ActorId, f64, DamageCause),
    Kill(ActorId),
    Restore(ActorId),
    Notify(ActorId, String),
}

#[derive(Default)]
struct RecordingHost {
    locations: HashMap<ActorId, Location>,
    permissions: Vec<(ActorId, String)>,
    calls: Vec<Call>,
}

impl RecordingHost {
    fn damage_to(&self, actor: ActorId, cause: DamageCause) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Damage(a, amount, c) if *a == actor && *c == cause => Some(*amount),
                _ => None,
            })
            .collect()
    }

    fn killed(&self, actor: ActorId) -> bool {
        self.calls.contains(&Call::Kill(actor))
    }

    fn restored(&self, actor: ActorId) -> bool {
        self.calls.contains(&Call::Restore(actor))
    }
}

impl Host for RecordingHost {
    fn location(&self, actor: ActorId) -> Option<Location> {
        self.locations.get(&actor).cloned()
    }

    fn teleport(&mut self, actor: ActorId, to: &Location) -> bool {
        self.locations.insert(actor, to.clone());
        self.calls.push(Call::Teleport(actor, to.clone()));
        true
    }

    fn damage(&mut self, actor: ActorId, amount: f64, cause: DamageCause) {
        self.calls.push(Call::Damage(actor, amount, cause));
    }

    fn kill(&mut self, actor: ActorId) {
        self.calls.push(Call::Kill(actor));
    }

    fn backup(&mut self, actor: ActorId) -> SavedState {
        SavedState {
            location: self
                .locations
                .get(&actor)
                .cloned()
                .unwrap_or_else(|| Location::new("lobby", 0.0, 64.0, 0.0)),
            payload: vec![actor.0 as u8],
        }
    }

    fn restore(&mut self, actor: ActorId, saved: SavedState) {
        self.locations.insert(actor, saved.location);
        self.calls.push(Call::Restore(actor));
    }

    fn has_permission(&self, actor: ActorId, node: &str) -> bool {
        self.permissions.iter().any(|(a, n)| *a == actor && n == node)
    }

    fn notify(&mut self, actor: ActorId, message: &str) {
        self.calls.push(Call::Notify(actor, message.to_string()));
    }
}

/// Counts lives per fighter; a fighter with lives left respawns.
struct LivesGoal {
    initial: u32,
    lives: IndexMap<ActorId, u32>,
}

impl Hooks for LivesGoal {
    fn name(&self) -> &str {
        "lives"
    }

    fn on_start(&mut self, cx: &mut HookCx) {
        self.lives = cx.view.fighters().map(|m| (m.id, self.initial)).collect();
    }

    fn reset(&mut self) {
        self.lives.clear();
    }
}

impl Goal for LivesGoal {
    fn check_death(&mut self, _cx: &mut HookCx, victim: ActorId, _killer: Option<ActorId>) -> DeathVerdict {
        match self.lives.get_mut(&victim) {
            Some(left) if *left > 1 => {
                *left -= 1;
                DeathVerdict::Respawn
            }
            Some(left) => {
                *left = 0;
                DeathVerdict::Eliminate
            }
            None => DeathVerdict::Unhandled,
        }
    }

    fn player_lives(&mut self) -> Option<&mut IndexMap<ActorId, u32>> {
        Some(&mut self.lives)
    }

    fn timed_scores(&self, _view: &ArenaView) -> IndexMap<ActorId, i64> {
        self.lives.iter().map(|(a, l)| (*a, i64::from(*l))).collect()
    }
}

/// Panics in every hook it implements.
struct FaultyModule;

impl Hooks for FaultyModule {
    fn name(&self) -> &str {
        "faulty"
    }

    fn check_join(&mut self, _cx: &mut HookCx, _actor: ActorId) -> Result<(), String> {
        panic!("faulty check_join");
    }

    fn on_join(&mut self, _cx: &mut HookCx, _actor: ActorId) {
        panic!("faulty on_join");
    }

    fn on_death(&mut self, _cx: &mut HookCx, _victim: ActorId, _killer: Option<ActorId>) {
        panic!("faulty on_death");
    }
}

impl Module for FaultyModule {
    fn priority(&self) -> i32 {
        -10
    }
}

/// Counts the hooks it sees.
struct CountingModule {
    joins: Arc<AtomicUsize>,
    deaths: Arc<AtomicUsize>,
}

impl Hooks for CountingModule {
    fn name(&self) -> &str {
        "counter"
    }

    fn on_join(&mut self, _cx: &mut HookCx, _actor: ActorId) {
        self.joins.fetch_add(1, Ordering::SeqCst);
    }

    fn on_death(&mut self, _cx: &mut HookCx, _victim: ActorId, _killer: Option<ActorId>) {
        self.deaths.fetch_add(1, Ordering::SeqCst);
    }
}

impl Module for CountingModule {}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn at(x: f64, y: f64, z: f64) -> Location {
    Location::new(WORLD, x, y, z)
}

fn config() -> ArenaConfig {
    ArenaConfig {
        min_players: 2,
        countdown_ticks: 5,
        end_delay_ticks: 0,
        nocamp_interval_ticks: 10,
        nocamp_damage: 2.0,
        ..ArenaConfig::default()
    }
}

fn registry() -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::new();
    registry.register(|r| {
        r.goal("lives", || {
            Box::new(LivesGoal {
                initial: 2,
                lives: IndexMap::new(),
            })
        });
    });
    registry
}

/// An open arena with a 0..10 battle cuboid, a spawn inside it and a
/// lounge outside.
fn setup_arena(m: &mut ArenaManager<RecordingHost>, name: &str, config: ArenaConfig) {
    m.create_arena(name, config).unwrap();
    m.add_region(name, "field", RegionKind::Battle, "cuboid", WORLD, (DVec3::ZERO, DVec3::splat(10.0)))
        .unwrap();
    m.set_spawn(name, "spawn", at(1.0, 1.0, 1.0), None).unwrap();
    m.set_spawn(name, "lounge", at(50.0, 1.0, 50.0), None).unwrap();
    m.set_spawn(name, "spectator", at(60.0, 1.0, 60.0), None).unwrap();
    m.open(name).unwrap();
}

fn manager(config: ArenaConfig) -> ArenaManager<RecordingHost> {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    setup_arena(&mut m, "pit", config);
    m
}

fn tick(m: &mut ArenaManager<RecordingHost>, n: u64) {
    for _ in 0..n {
        m.tick();
    }
}

/// Joins and readies `actors`, then runs the countdown out.
fn start_fight(m: &mut ArenaManager<RecordingHost>, actors: &[ActorId]) {
    for a in actors {
        m.join(*a, "pit").unwrap();
    }
    for a in actors {
        m.ready(*a).unwrap();
    }
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::CountingDown);
    tick(m, 5);
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Fight);
}

fn walk(m: &mut ArenaManager<RecordingHost>, actor: ActorId, to: Location) {
    m.host_mut().locations.insert(actor, to.clone());
    m.movement(actor, &to);
}

fn status(m: &ArenaManager<RecordingHost>, actor: ActorId) -> ParticipantStatus {
    m.participants()
        .get(actor)
        .map_or(ParticipantStatus::None, |p| p.status())
}

fn flag(m: &mut ArenaManager<RecordingHost>, region: &str, flag: RegionFlag) {
    m.set_region_flag("pit", region, flag, true).unwrap();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_join_puts_actor_in_lounge_with_backup() {
    let mut m = manager(config());
    m.join(A1, "pit").unwrap();

    let p = m.participants().get(A1).unwrap();
    assert_eq!(p.status(), ParticipantStatus::Lounge);
    assert_eq!(p.arena.as_deref(), Some("pit"));
    assert_eq!(p.team.as_deref(), Some(ArenaConfig::FREE_TEAM));
    assert!(p.saved.is_some());
    assert_eq!(m.host().locations[&A1].position(), DVec3::new(50.5, 1.0, 50.5));
}

#[test]
fn test_countdown_requires_min_players_ready() {
    let mut m = manager(ArenaConfig {
        min_players: 3,
        ..config()
    });
    for a in [A1, A2, A3] {
        m.join(a, "pit").unwrap();
    }
    m.ready(A1).unwrap();
    m.ready(A2).unwrap();
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);

    m.ready(A3).unwrap();
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::CountingDown);
}

#[test]
fn test_countdown_not_started_below_min_players_even_if_all_ready() {
    let mut m = manager(config());
    m.join(A1, "pit").unwrap();
    m.ready(A1).unwrap();
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);
    let announced = m
        .host()
        .calls
        .iter()
        .any(|c| matches!(c, Call::Notify(a, msg) if *a == A1 && msg.contains("1/2")));
    assert!(announced);
}

#[test]
fn test_countdown_reverts_to_open_when_participant_leaves() {
    let mut m = manager(config());
    m.join(A1, "pit").unwrap();
    m.join(A2, "pit").unwrap();
    m.ready(A1).unwrap();
    m.ready(A2).unwrap();
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::CountingDown);

    m.leave(A2).unwrap();
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);

    tick(&mut m, 10);
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);
    assert_eq!(status(&m, A1), ParticipantStatus::Ready);
}

#[test]
fn test_fight_starts_after_countdown_and_teleports_to_spawn() {
    let mut m = manager(config());
    start_fight(&mut m, &[A1, A2]);

    assert_eq!(m.arena("pit").unwrap().round(), 1);
    for a in [A1, A2] {
        assert_eq!(status(&m, a), ParticipantStatus::Fight);
        assert_eq!(m.host().locations[&a].position(), DVec3::new(1.5, 1.0, 1.5));
    }
}

#[test]
fn test_leave_mid_fight_ends_match_and_restores_everyone() {
    let mut m = manager(config());
    start_fight(&mut m, &[A1, A2]);

    m.leave(A1).unwrap();

    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);
    assert!(m.host().restored(A1));
    assert!(m.host().restored(A2));
    assert_eq!(status(&m, A2), ParticipantStatus::None);
    assert!(m.participants().get(A2).unwrap().arena.is_none());
    assert!(m.arena("pit").unwrap().members().is_empty());
}

#[test]
fn test_end_delay_defers_reset() {
    let mut m = manager(ArenaConfig {
        end_delay_ticks: 20,
        ..config()
    });
    start_fight(&mut m, &[A1, A2]);
    m.death(A2, Some(A1)).unwrap();

    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Ending);
    assert_eq!(status(&m, A2), ParticipantStatus::Lost);
    tick(&mut m, 20);
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);
    assert_eq!(status(&m, A1), ParticipantStatus::None);
}

#[test]
fn test_force_end_outside_fight_is_rejected() {
    let mut m = manager(config());
    assert!(matches!(
        m.force_end("pit"),
        Err(ArenaError::WrongPhase {
            phase: ArenaPhase::Open,
            ..
        })
    ));
    start_fight(&mut m, &[A1, A2]);
    m.force_end("pit").unwrap();
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);
}

#[test]
fn test_timed_end_highest_score_wins() {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    setup_arena(
        &mut m,
        "pit",
        ArenaConfig {
            goal: "lives".into(),
            match_duration_ticks: 20,
            end_delay_ticks: 50,
            ..config()
        },
    );
    start_fight(&mut m, &[A1, A2]);
    m.death(A1, Some(A2)).unwrap();
    assert_eq!(status(&m, A1), ParticipantStatus::Fight);

    tick(&mut m, 20);
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Ending);
    assert_eq!(status(&m, A1), ParticipantStatus::Lost);
    assert_eq!(status(&m, A2), ParticipantStatus::Fight);
}

// ---------------------------------------------------------------------------
// Join rejections
// ---------------------------------------------------------------------------

#[test]
fn test_join_locked_arena_needs_override_permission() {
    let mut m = manager(config());
    m.lock("pit", true).unwrap();
    assert!(matches!(m.join(A1, "pit"), Err(ArenaError::Locked(_))));

    m.host_mut()
        .permissions
        .push((A1, "gladius.override".to_string()));
    m.join(A1, "pit").unwrap();
}

#[test]
fn test_join_twice_is_rejected() {
    let mut m = manager(config());
    m.join(A1, "pit").unwrap();
    assert!(matches!(m.join(A1, "pit"), Err(ArenaError::AlreadyInArena(a)) if a == A1));
}

#[test]
fn test_join_full_arena_is_rejected_before_modules() {
    let joins = Arc::new(AtomicUsize::new(0));
    let deaths = Arc::new(AtomicUsize::new(0));
    let mut registry = registry();
    let (j, d) = (joins.clone(), deaths.clone());
    registry.register(move |r| {
        let (j, d) = (j.clone(), d.clone());
        r.module("counter", move || {
            Box::new(CountingModule {
                joins: j.clone(),
                deaths: d.clone(),
            })
        });
    });
    let mut m = ArenaManager::new(registry, RecordingHost::default());
    setup_arena(
        &mut m,
        "pit",
        ArenaConfig {
            max_players: 1,
            modules: vec!["counter".into()],
            ..config()
        },
    );

    m.join(A1, "pit").unwrap();
    assert!(matches!(m.join(A2, "pit"), Err(ArenaError::Full(_))));
    assert_eq!(joins.load(Ordering::SeqCst), 1);
    assert!(m.participants().get(A2).is_none_or(|p| p.arena.is_none()));
}

#[test]
fn test_join_during_setup_is_rejected() {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    m.create_arena("raw", config()).unwrap();
    assert!(matches!(
        m.join(A1, "raw"),
        Err(ArenaError::WrongPhase {
            phase: ArenaPhase::Setup,
            ..
        })
    ));
}

#[test]
fn test_join_from_too_far_away_is_rejected() {
    let mut m = manager(ArenaConfig {
        join_radius: 20.0,
        ..config()
    });
    m.host_mut().locations.insert(A1, at(500.0, 1.0, 500.0));
    m.host_mut().locations.insert(A2, at(15.0, 1.0, 5.0));
    assert!(matches!(m.join(A1, "pit"), Err(ArenaError::TooFarAway(a)) if a == A1));
    m.join(A2, "pit").unwrap();
}

#[test]
fn test_open_without_spawn_reports_missing() {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    m.create_arena("raw", config()).unwrap();
    let err = m.open("raw").unwrap_err();
    assert!(matches!(err, ArenaError::Incomplete(missing) if missing == vec!["spawn".to_string()]));
}

// ---------------------------------------------------------------------------
// Region flags
// ---------------------------------------------------------------------------

#[test]
fn test_win_region_ffa_marks_other_fighters_lost() {
    let mut m = manager(ArenaConfig {
        end_delay_ticks: 20,
        ..config()
    });
    flag(&mut m, "field", RegionFlag::Win);
    start_fight(&mut m, &[A1, A2, A3]);

    walk(&mut m, A1, at(5.0, 5.0, 5.0));

    assert_eq!(status(&m, A1), ParticipantStatus::Fight);
    assert_eq!(status(&m, A2), ParticipantStatus::Lost);
    assert_eq!(status(&m, A3), ParticipantStatus::Lost);
    assert!(m.host().killed(A2) && m.host().killed(A3));
    assert!(!m.host().killed(A1));
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Ending);
}

#[test]
fn test_lose_region_teams_marks_own_team_lost() {
    let mut m = manager(ArenaConfig {
        free_for_all: false,
        end_delay_ticks: 20,
        ..config()
    });
    flag(&mut m, "field", RegionFlag::Lose);
    let a4 = ActorId(4);
    start_fight(&mut m, &[A1, A2, A3, a4]);
    let red: Vec<ActorId> = m.arena("pit").unwrap().team("red").unwrap().members().to_vec();
    assert_eq!(red, vec![A1, A3]);

    walk(&mut m, A1, at(5.0, 5.0, 5.0));

    assert_eq!(status(&m, A1), ParticipantStatus::Lost);
    assert_eq!(status(&m, A3), ParticipantStatus::Lost);
    assert_eq!(status(&m, A2), ParticipantStatus::Fight);
    assert_eq!(status(&m, a4), ParticipantStatus::Fight);
}

#[test]
fn test_death_region_grants_life_before_lethal_damage() {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    setup_arena(
        &mut m,
        "pit",
        ArenaConfig {
            goal: "lives".into(),
            ..config()
        },
    );
    m.add_region("pit", "pitfall", RegionKind::Custom, "cuboid", WORLD, (DVec3::splat(20.0), DVec3::splat(30.0)))
        .unwrap();
    m.arena_mut("pit")
        .unwrap()
        .region_mut("pitfall")
        .unwrap()
        .flags
        .insert(RegionFlag::Death);
    start_fight(&mut m, &[A1, A2]);
    assert_eq!(m.player_lives(A1), Some(2));

    walk(&mut m, A1, at(25.0, 25.0, 25.0));

    assert_eq!(m.player_lives(A1), Some(3));
    assert_eq!(m.host().damage_to(A1, DamageCause::RegionDeath), vec![REGION_DEATH_DAMAGE]);

    // The host reports the death the damage caused.
    m.death(A1, None).unwrap();
    assert_eq!(m.player_lives(A1), Some(2));
    assert_eq!(status(&m, A1), ParticipantStatus::Fight);
}

#[test]
fn test_nocamp_damages_once_per_interval_until_leaving() {
    let mut m = manager(config());
    flag(&mut m, "field", RegionFlag::NoCamp);
    start_fight(&mut m, &[A1, A2]);

    walk(&mut m, A1, at(5.0, 5.0, 5.0));
    assert!(m.host().damage_to(A1, DamageCause::Camping).is_empty());

    tick(&mut m, 30);
    assert_eq!(m.host().damage_to(A1, DamageCause::Camping), vec![2.0, 2.0, 2.0]);

    walk(&mut m, A1, at(50.0, 5.0, 50.0));
    tick(&mut m, 30);
    assert_eq!(m.host().damage_to(A1, DamageCause::Camping).len(), 3);
    assert!(m.host().damage_to(A2, DamageCause::Camping).is_empty());
}

#[test]
fn test_movement_within_block_does_not_evaluate_flags() {
    let mut m = manager(ArenaConfig {
        end_delay_ticks: 20,
        ..config()
    });
    flag(&mut m, "field", RegionFlag::Win);
    start_fight(&mut m, &[A1, A2]);

    // Spawned at (1.5, 1, 1.5); this stays in block (1, 1, 1).
    walk(&mut m, A1, at(1.9, 1.2, 1.1));
    assert_eq!(status(&m, A2), ParticipantStatus::Fight);
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Fight);
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

#[test]
fn test_panicking_module_does_not_block_other_modules() {
    let joins = Arc::new(AtomicUsize::new(0));
    let deaths = Arc::new(AtomicUsize::new(0));
    let mut registry = registry();
    let (j, d) = (joins.clone(), deaths.clone());
    registry.register(move |r| {
        let (j, d) = (j.clone(), d.clone());
        r.module("faulty", || Box::new(FaultyModule)).module("counter", move || {
            Box::new(CountingModule {
                joins: j.clone(),
                deaths: d.clone(),
            })
        });
    });
    let mut m = ArenaManager::new(registry, RecordingHost::default());
    setup_arena(
        &mut m,
        "pit",
        ArenaConfig {
            modules: vec!["counter".into(), "faulty".into()],
            ..config()
        },
    );
    assert_eq!(m.arena("pit").unwrap().module_names(), vec!["faulty", "counter"]);

    start_fight(&mut m, &[A1, A2]);
    assert_eq!(joins.load(Ordering::SeqCst), 2);

    m.death(A2, Some(A1)).unwrap();
    assert_eq!(deaths.load(Ordering::SeqCst), 1);
    assert_eq!(m.arena("pit").unwrap().phase(), ArenaPhase::Open);
}

#[test]
fn test_unknown_module_is_skipped_with_issue() {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    let issues = m
        .create_arena(
            "pit",
            ArenaConfig {
                modules: vec!["ghost".into()],
                ..config()
            },
        )
        .unwrap();
    assert_eq!(issues, vec![LoadIssue::UnknownModule("ghost".into())]);
    assert!(m.arena("pit").unwrap().module_names().is_empty());
}

#[test]
fn test_unknown_goal_fails_create() {
    let mut m = ArenaManager::new(registry(), RecordingHost::default());
    let result = m.create_arena(
        "pit",
        ArenaConfig {
            goal: "capture-the-flag".into(),
            ..config()
        },
    );
    assert!(matches!(result, Err(ArenaError::Extension(_))));
    assert!(m.arena("pit").is_none());
}

// ---------------------------------------------------------------------------
// Invariants and queries
// ---------------------------------------------------------------------------

fn assert_membership(m: &ArenaManager<RecordingHost>, actors: &[ActorId]) {
    for actor in actors {
        let teams = m
            .arenas()
            .flat_map(|a| a.teams())
            .filter(|t| t.contains(*actor))
            .count();
        let in_arena = m
            .participants()
            .get(*actor)
            .is_some_and(|p| p.arena.is_some());
        assert!(teams <= 1, "{actor} is in {teams} teams");
        assert_eq!(in_arena, teams == 1, "{actor}: arena set = {in_arena}, teams = {teams}");
    }
}

#[test]
fn test_arena_reference_iff_single_team_membership() {
    let mut m = manager(config());
    setup_arena(&mut m, "den", config());
    let everyone = [A1, A2, A3];

    m.join(A1, "pit").unwrap();
    m.join(A2, "pit").unwrap();
    assert_membership(&m, &everyone);

    m.spectate(A3, "pit").unwrap();
    assert_eq!(status(&m, A3), ParticipantStatus::Watch);
    assert!(m.arena("pit").unwrap().spectators().contains(&A3));
    assert_membership(&m, &everyone);

    assert!(matches!(m.join(A1, "den"), Err(ArenaError::AlreadyInArena(_))));
    m.leave(A2).unwrap();
    m.join(A2, "den").unwrap();
    assert_membership(&m, &everyone);

    m.leave(A3).unwrap();
    m.disconnect(A1);
    assert!(m.participants().get(A1).is_none());
    assert_membership(&m, &everyone);
}

#[test]
fn test_choose_class_only_from_configured_classes() {
    let mut m = manager(ArenaConfig {
        classes: vec!["Archer".into()],
        ..config()
    });
    m.join(A1, "pit").unwrap();
    assert!(matches!(m.choose_class(A1, "wizard"), Err(ArenaError::UnknownClass(_))));
    m.choose_class(A1, "archer").unwrap();
    assert_eq!(m.participants().get(A1).unwrap().class.as_deref(), Some("Archer"));
}

#[test]
fn test_block_event_in_protected_region_is_denied() {
    let mut m = manager(config());
    m.set_region_protection("pit", "field", RegionProtection::Break, true)
        .unwrap();
    m.join(A1, "pit").unwrap();

    let inside = BlockEvent {
        kind: BlockEventKind::Break,
        location: at(2.0, 2.0, 2.0),
    };
    assert!(matches!(m.block_event(A1, &inside), Err(ArenaError::Denied(_))));
    let outside = BlockEvent {
        location: at(80.0, 2.0, 2.0),
        ..inside.clone()
    };
    m.block_event(A1, &outside).unwrap();
    // Actors outside any arena are not our business.
    m.block_event(A2, &inside).unwrap();

    m.set_region_protection("pit", "field", RegionProtection::Break, false)
        .unwrap();
    m.block_event(A1, &inside).unwrap();
}

#[test]
fn test_teleport_protection_respects_telepass() {
    let mut m = manager(config());
    m.set_region_protection("pit", "field", RegionProtection::Teleport, true)
        .unwrap();
    m.join(A1, "pit").unwrap();

    assert!(!m.allows_teleport(A1, &at(5.0, 5.0, 5.0)));
    assert!(m.allows_teleport(A1, &at(70.0, 5.0, 70.0)));
    m.set_telepass(A1, true);
    assert!(m.allows_teleport(A1, &at(5.0, 5.0, 5.0)));
}

#[test]
fn test_no_damage_region_and_lounge_block_damage() {
    let mut m = manager(config());
    flag(&mut m, "field", RegionFlag::NoDamage);
    m.join(A1, "pit").unwrap();
    assert!(!m.damage_allowed(A1));
    assert!(m.damage_allowed(A3));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_save_and_load_restores_arena() {
    let mut m = manager(ArenaConfig {
        free_for_all: false,
        classes: vec!["archer".into()],
        ..config()
    });
    m.set_spawn("pit", "red_spawn_archer", at(3.0, 1.0, 3.0), Some(1.5))
        .unwrap();
    flag(&mut m, "field", RegionFlag::NoCamp);
    m.lock("pit", true).unwrap();
    let def = m.save("pit").unwrap();

    let mut fresh = ArenaManager::new(registry(), RecordingHost::default());
    let issues = fresh.load_arena(def.clone()).unwrap();
    assert!(issues.is_empty(), "{issues:?}");

    let arena = fresh.arena("pit").unwrap();
    assert_eq!(arena.phase(), ArenaPhase::Open);
    assert!(arena.is_locked());
    assert!(arena.region("field").unwrap().has_flag(RegionFlag::NoCamp));
    assert_eq!(arena.spawns().exact(Some("red"), "spawn", Some("archer")), Some(&at(3.0, 1.0, 3.0)));
    assert_eq!(fresh.save("pit").unwrap(), def);
}

#[test]
fn test_load_skips_stale_references() {
    let m = manager(config());
    let mut def = m.save("pit").unwrap();
    def.name = "copy".into();
    def.config.modules.push("ghost".into());
    def.regions[0].shape = "torus".into();
    def.spawns.insert("broken".into(), "arena,1,2".into());

    let mut fresh = ArenaManager::new(registry(), RecordingHost::default());
    let issues = fresh.load_arena(def).unwrap();

    assert!(issues.contains(&LoadIssue::UnknownModule("ghost".into())));
    assert!(issues.iter().any(|i| matches!(i, LoadIssue::UnknownShape { shape, .. } if shape == "torus")));
    assert!(issues.iter().any(|i| matches!(i, LoadIssue::BadSpawn { key, .. } if key == "broken")));
    let arena = fresh.arena("copy").unwrap();
    assert!(arena.regions().is_empty());
    assert_eq!(arena.spawns().len(), 3);
}

#[test]
fn test_load_region_without_world_aborts() {
    let m = manager(config());
    let mut def = m.save("pit").unwrap();
    def.regions[0].world.clear();

    let mut fresh = ArenaManager::new(registry(), RecordingHost::default());
    assert!(matches!(fresh.load_arena(def), Err(ArenaError::Region(_))));
    assert!(fresh.arena("pit").is_none());
}

// =========================================================================
// Administration
// =========================================================================

#[test]
fn test_move_and_extend_region_change_containment() {
    let mut m = manager(config());
    let arena = m.arena_mut("pit").unwrap();

    arena.extend_region("field", Direction::East, 5.0).unwrap();
    assert!(arena.region("field").unwrap().contains(&at(14.0, 2.0, 2.0)));

    arena.move_region("field", Direction::East, 20.0).unwrap();
    let field = arena.region("field").unwrap();
    assert!(!field.contains(&at(2.0, 2.0, 2.0)));
    assert!(field.contains(&at(22.0, 2.0, 2.0)));

    assert!(matches!(
        arena.move_region("nowhere", Direction::Up, 1.0),
        Err(ArenaError::UnknownRegion(_))
    ));
}

#[test]
fn test_remove_region_and_spawn() {
    let mut m = manager(config());
    assert!(m.remove_spawn("pit", "spectator").unwrap());
    assert!(!m.remove_spawn("pit", "spectator").unwrap());

    let arena = m.arena_mut("pit").unwrap();
    let removed = arena.remove_region("FIELD").unwrap();
    assert_eq!(removed.name(), "field");
    assert!(arena.regions().is_empty());
    assert!(matches!(arena.remove_region("field"), Err(ArenaError::UnknownRegion(_))));
}

#[test]
fn test_add_region_twice_is_rejected() {
    let mut m = manager(config());
    let err = m
        .add_region("pit", "field", RegionKind::Custom, "sphere", WORLD, (DVec3::ZERO, DVec3::ONE))
        .unwrap_err();
    assert!(matches!(err, ArenaError::RegionExists(_)));
}

#[test]
fn test_add_team_extends_implicit_pair() {
    let mut m = manager(ArenaConfig {
        free_for_all: false,
        ..config()
    });
    let arena = m.arena_mut("pit").unwrap();
    arena.add_team(TeamConfig::new("green", "GREEN")).unwrap();

    let names: Vec<&str> = arena.teams().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["red", "blue", "green"]);
    assert_eq!(arena.config().teams.len(), 3);
    assert!(arena.add_team(TeamConfig::new("green", "LIME")).is_err());
}

#[test]
fn test_add_team_in_free_for_all_is_denied() {
    let mut m = manager(config());
    let arena = m.arena_mut("pit").unwrap();
    assert!(matches!(
        arena.add_team(TeamConfig::new("green", "GREEN")),
        Err(ArenaError::Denied(_))
    ));
}

//! Extension contracts: goal engines and behaviour modules.
//!
//! An arena has exactly one [`Goal`] (the win condition) and any number of
//! [`Module`]s (cross-cutting behaviour such as join policies or rewards).
//! Both share the lifecycle hooks in [`Hooks`]; every hook has a default, so
//! an extension only implements what it cares about and "not implemented"
//! simply means the default answer.
//!
//! Hooks never touch the arena directly. They read an [`ArenaView`]
//! snapshot and push [`Effect`]s onto the [`HookCx`]; the arena applies the
//! effects once the whole dispatch pass is over. A hook that panics is
//! logged and treated as having returned its default.

use std::sync::Arc;

use gladius_protocol::{ActorId, SpawnKey};
use gladius_session::ParticipantStatus;
use indexmap::IndexMap;

use crate::{ArenaConfig, ArenaError, ArenaPhase, BlockEvent};

// ---------------------------------------------------------------------------
// View and effects
// ---------------------------------------------------------------------------

/// One team member as seen by a hook.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberView {
    pub id: ActorId,
    pub team: String,
    pub status: ParticipantStatus,
    pub class: Option<String>,
}

/// A read-only snapshot of an arena, taken at the start of a dispatch pass.
#[derive(Debug, Clone)]
pub struct ArenaView {
    pub name: String,
    pub phase: ArenaPhase,
    pub round: u32,
    pub config: Arc<ArenaConfig>,
    pub teams: Vec<String>,
    /// Team members in team order, then join order.
    pub members: Vec<MemberView>,
    pub spectators: Vec<ActorId>,
}

impl ArenaView {
    pub fn member(&self, id: ActorId) -> Option<&MemberView> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn team_members<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a MemberView> + 'a {
        self.members.iter().filter(move |m| m.team == team)
    }

    /// Members still in the fight (alive or about to respawn).
    pub fn fighters(&self) -> impl Iterator<Item = &MemberView> {
        self.members.iter().filter(|m| m.status.is_fighting())
    }

    /// Teams with at least one member still in the fight, in team order.
    pub fn fighting_teams(&self) -> Vec<&str> {
        self.teams
            .iter()
            .filter(|t| self.team_members(t).any(|m| m.status.is_fighting()))
            .map(String::as_str)
            .collect()
    }

    pub fn free_for_all(&self) -> bool {
        self.config.free_for_all
    }
}

/// A change a hook asks the arena to make.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify { actor: ActorId, message: String },
    /// Message every member and spectator.
    Broadcast(String),
    /// Mark a fighter as lost.
    Eliminate(ActorId),
    /// Remove an actor from the arena, restoring them.
    Kick(ActorId),
    /// End the fight now; whoever is still fighting wins.
    EndMatch,
}

/// What a hook receives: the snapshot plus an outbox for effects.
#[derive(Debug)]
pub struct HookCx {
    pub view: ArenaView,
    effects: Vec<Effect>,
}

impl HookCx {
    pub fn new(view: ArenaView) -> Self {
        Self {
            view,
            effects: Vec::new(),
        }
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn notify(&mut self, actor: ActorId, message: impl Into<String>) {
        self.push(Effect::Notify {
            actor,
            message: message.into(),
        });
    }

    pub fn broadcast(&mut self, message: impl Into<String>) {
        self.push(Effect::Broadcast(message.into()));
    }

    pub(crate) fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

// ---------------------------------------------------------------------------
// Shared hooks
// ---------------------------------------------------------------------------

/// Lifecycle hooks shared by goals and modules.
///
/// Vetoing hooks return `Err(reason)`; the reason is shown to the actor.
pub trait Hooks: Send {
    /// Registry name, used in logs.
    fn name(&self) -> &str;

    fn check_join(&mut self, _cx: &mut HookCx, _actor: ActorId) -> Result<(), String> {
        Ok(())
    }

    fn check_start(&mut self, _cx: &mut HookCx) -> Result<(), String> {
        Ok(())
    }

    /// Block break/place/craft/drop/pickup/explode by a participant.
    fn on_block_event(
        &mut self,
        _cx: &mut HookCx,
        _actor: ActorId,
        _event: &BlockEvent,
    ) -> Result<(), String> {
        Ok(())
    }

    fn on_join(&mut self, _cx: &mut HookCx, _actor: ActorId) {}

    /// Called for every departure: leave, kick and disconnect.
    fn on_leave(&mut self, _cx: &mut HookCx, _actor: ActorId) {}

    fn on_start(&mut self, _cx: &mut HookCx) {}

    fn on_death(&mut self, _cx: &mut HookCx, _victim: ActorId, _killer: Option<ActorId>) {}

    /// The fight is decided. Modules hand out rewards here.
    fn on_end(&mut self, _cx: &mut HookCx, _winners: &[ActorId]) {}

    /// Forget per-match state; the arena is about to reopen.
    fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// The goal's answer to a death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathVerdict {
    Respawn,
    Eliminate,
    /// The goal has no opinion; the arena eliminates.
    Unhandled,
}

/// The single win condition of an arena.
pub trait Goal: Hooks {
    /// Whether one more participant fits.
    ///
    /// The default enforces `max_players` and, for teamed arenas,
    /// `max_per_team` on every team.
    fn check_capacity(&self, view: &ArenaView) -> Result<(), ArenaError> {
        let config = &view.config;
        if config.max_players > 0 && view.members.len() >= config.max_players {
            return Err(ArenaError::Full(view.name.clone()));
        }
        if config.max_per_team > 0
            && !view
                .teams
                .iter()
                .any(|t| view.team_members(t).count() < config.max_per_team)
        {
            return Err(ArenaError::TeamFull(view.name.clone()));
        }
        Ok(())
    }

    /// Whether the fight is over.
    ///
    /// The default ends it when at most one participant (free-for-all) or
    /// one team is still fighting.
    fn check_end(&self, view: &ArenaView) -> bool {
        if view.free_for_all() {
            view.fighters().count() <= 1
        } else {
            view.fighting_teams().len() <= 1
        }
    }

    fn check_death(
        &mut self,
        _cx: &mut HookCx,
        _victim: ActorId,
        _killer: Option<ActorId>,
    ) -> DeathVerdict {
        DeathVerdict::Unhandled
    }

    /// Remaining lives per participant, for life-based goals.
    fn player_lives(&mut self) -> Option<&mut IndexMap<ActorId, u32>> {
        None
    }

    /// Remaining lives per team, for life-based goals.
    fn team_lives(&mut self) -> Option<&mut IndexMap<String, u32>> {
        None
    }

    /// Scores used when the match timer runs out. Highest score wins;
    /// fighters without a score count as zero.
    fn timed_scores(&self, _view: &ArenaView) -> IndexMap<ActorId, i64> {
        IndexMap::new()
    }

    /// Spawn names this goal needs but `defined` lacks.
    ///
    /// The default needs a `spawn` for every team, either team-qualified or
    /// shared.
    fn missing_spawns(&self, view: &ArenaView, defined: &[SpawnKey]) -> Vec<String> {
        let shared = defined
            .iter()
            .any(|k| k.team.is_none() && k.base_matches("spawn"));
        if shared {
            return Vec::new();
        }
        if view.free_for_all() {
            return vec!["spawn".to_string()];
        }
        view.teams
            .iter()
            .filter(|team| {
                !defined.iter().any(|k| {
                    k.team.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(team))
                        && k.base_matches("spawn")
                })
            })
            .map(|team| format!("{team}_spawn"))
            .collect()
    }
}

/// The built-in goal: every hook at its default.
///
/// Deaths eliminate; the last participant or team still fighting wins.
#[derive(Debug, Default, Clone)]
pub struct StandardGoal;

impl Hooks for StandardGoal {
    fn name(&self) -> &str {
        "standard"
    }
}

impl Goal for StandardGoal {}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// A module's answer to a join or spectate offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinClaim {
    /// Not interested; ask the next module.
    Pass,
    /// This module handles the request; its `commit_*` hook follows.
    Claim,
}

/// How a claimed join is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinPlan {
    /// Team to put the actor in; `None` lets the arena pick.
    pub team: Option<String>,
    /// Straight to the battlefield instead of the lounge.
    pub to_battle: bool,
    /// Spawn base to teleport to; `None` uses the arena's default.
    pub spawn: Option<String>,
}

/// A non-exclusive behaviour extension.
pub trait Module: Hooks {
    /// Dispatch order, ascending. Equal priorities keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    fn handle_join(&mut self, _cx: &mut HookCx, _actor: ActorId) -> JoinClaim {
        JoinClaim::Pass
    }

    /// Called on the module that claimed the join.
    fn commit_join(&mut self, _cx: &mut HookCx, _actor: ActorId) -> JoinPlan {
        JoinPlan::default()
    }

    fn handle_spectate(&mut self, _cx: &mut HookCx, _actor: ActorId) -> JoinClaim {
        JoinClaim::Pass
    }

    /// Called on the module that claimed the spectate request. Returns the
    /// spawn base to send the spectator to.
    fn commit_spectate(&mut self, _cx: &mut HookCx, _actor: ActorId) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(free_for_all: bool, members: &[(u64, &str, ParticipantStatus)]) -> ArenaView {
        let config = ArenaConfig {
            free_for_all,
            max_players: 3,
            ..ArenaConfig::default()
        };
        ArenaView {
            name: "pit".into(),
            phase: ArenaPhase::Fight,
            round: 1,
            teams: config.team_configs().into_iter().map(|t| t.name).collect(),
            config: Arc::new(config),
            members: members
                .iter()
                .map(|(id, team, status)| MemberView {
                    id: ActorId(*id),
                    team: (*team).into(),
                    status: *status,
                    class: None,
                })
                .collect(),
            spectators: Vec::new(),
        }
    }

    #[test]
    fn test_check_end_ffa_last_fighter_standing() {
        use ParticipantStatus::*;
        let goal = StandardGoal;
        assert!(!goal.check_end(&view(true, &[(1, "free", Fight), (2, "free", Fight)])));
        assert!(goal.check_end(&view(true, &[(1, "free", Fight), (2, "free", Lost)])));
    }

    #[test]
    fn test_check_end_teams_counts_teams_not_members() {
        use ParticipantStatus::*;
        let goal = StandardGoal;
        let v = view(false, &[(1, "red", Fight), (2, "red", Fight), (3, "blue", Lost)]);
        assert!(goal.check_end(&v));
        let v = view(false, &[(1, "red", Fight), (3, "blue", Dead)]);
        assert!(!goal.check_end(&v));
    }

    #[test]
    fn test_check_capacity_rejects_when_full() {
        use ParticipantStatus::*;
        let goal = StandardGoal;
        let v = view(true, &[(1, "free", Lounge), (2, "free", Lounge), (3, "free", Ready)]);
        assert!(matches!(goal.check_capacity(&v), Err(ArenaError::Full(name)) if name == "pit"));
        let v = view(true, &[(1, "free", Lounge)]);
        assert!(goal.check_capacity(&v).is_ok());
    }

    #[test]
    fn test_missing_spawns_per_team() {
        let goal = StandardGoal;
        let v = view(false, &[]);
        let defined = [SpawnKey::new(Some("red"), "spawn1", None)];
        assert_eq!(goal.missing_spawns(&v, &defined), vec!["blue_spawn".to_string()]);
        let shared = [SpawnKey::base("spawn")];
        assert!(goal.missing_spawns(&v, &shared).is_empty());
        assert_eq!(goal.missing_spawns(&view(true, &[]), &[]), vec!["spawn".to_string()]);
    }
}

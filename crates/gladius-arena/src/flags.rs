//! Region flag evaluation for moving fighters.
//!
//! Evaluation runs once per fighter per block change. For each region:
//!
//! - `NoCamp` is handled on its own: inside the region the fighter's
//!   position is compared with the one recorded last time (see
//!   [`CampTracker`]); outside, the record is dropped.
//! - `Death`, `Win` and `Lose` only apply inside the region, and only the
//!   first one present fires, in that order.

use std::collections::HashMap;

use glam::DVec3;
use gladius_protocol::{ActorId, Location};
use gladius_region::{Region, RegionFlag};

/// The terminal flags, in firing priority.
const TERMINAL_FLAGS: [RegionFlag; 3] = [RegionFlag::Death, RegionFlag::Win, RegionFlag::Lose];

// ---------------------------------------------------------------------------
// CampTracker
// ---------------------------------------------------------------------------

/// Result of one no-camp observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampCheck {
    /// First sighting in this region; nothing happens yet.
    Grace,
    /// Still within the camping radius of the last sighting.
    Camping,
    Moved,
}

/// Last recorded position per (no-camp region, fighter).
#[derive(Debug, Default, Clone)]
pub struct CampTracker {
    positions: HashMap<(String, ActorId), DVec3>,
}

impl CampTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `position` with the last sighting and records it.
    pub fn observe(&mut self, region: &str, actor: ActorId, position: DVec3, radius: f64) -> CampCheck {
        match self.positions.insert((region.to_string(), actor), position) {
            None => CampCheck::Grace,
            Some(last) if last.distance(position) < radius => CampCheck::Camping,
            Some(_) => CampCheck::Moved,
        }
    }

    pub fn forget(&mut self, region: &str, actor: ActorId) -> bool {
        self.positions.remove(&(region.to_string(), actor)).is_some()
    }

    pub fn forget_actor(&mut self, actor: ActorId) {
        self.positions.retain(|(_, a), _| *a != actor);
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    /// Number of (region, fighter) records.
    pub fn tracked(&self) -> usize {
        self.positions.len()
    }

    /// Every record, sorted for a stable visiting order.
    pub fn entries(&self) -> Vec<(String, ActorId)> {
        let mut entries: Vec<_> = self.positions.keys().cloned().collect();
        entries.sort();
        entries
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// What one region does to a fighter at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagHit {
    pub camping: bool,
    /// `Death`, `Win` or `Lose`, when one fires.
    pub terminal: Option<RegionFlag>,
}

/// Evaluates the flags of `region` for `actor` standing at `at`.
pub fn evaluate(
    region: &Region,
    actor: ActorId,
    at: &Location,
    camp: &mut CampTracker,
    camp_radius: f64,
) -> FlagHit {
    let inside = region.contains(at);
    let mut hit = FlagHit::default();

    if region.has_flag(RegionFlag::NoCamp) {
        if inside {
            hit.camping =
                camp.observe(region.name(), actor, at.position(), camp_radius) == CampCheck::Camping;
        } else {
            camp.forget(region.name(), actor);
        }
    }

    if inside {
        hit.terminal = TERMINAL_FLAGS.into_iter().find(|f| region.has_flag(*f));
    }
    hit
}

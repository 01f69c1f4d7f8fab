//! The spawn resolver: named teleport targets and how one is chosen.
//!
//! Spawns are stored under their [`SpawnKey`]. A request names a base
//! (`spawn`, `lounge`, `spectator`, ...) and the requester's team and
//! class; [`SpawnBook::select`] returns every spawn that could serve it,
//! most specific first:
//!
//! | Tier | Spawn qualifiers |
//! |---|---|
//! | 0 | team and class both match |
//! | 1 | team matches, no class |
//! | 2 | class matches, no team |
//! | 3 | neither |
//!
//! A spawn qualified for a different team or class is never a candidate.
//! Within a tier the order is shuffled so that `spawn1`, `spawn2`, ... are
//! used evenly.

use std::f64::consts::TAU;

use glam::DVec3;
use gladius_protocol::{Location, ProtocolError, SpawnKey};
use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;

/// A named teleport target.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub key: SpawnKey,
    pub location: Location,
    /// Horizontal scatter radius around the location.
    pub offset: Option<f64>,
}

impl Spawn {
    /// The actual teleport target: the location moved by the arena-wide
    /// `offset`, then scattered randomly within this spawn's own radius.
    pub fn resolve(&self, offset: DVec3) -> Location {
        let mut target = self.location.offset(offset);
        if let Some(radius) = self.offset.filter(|r| *r > 0.0) {
            let mut rng = rand::rng();
            let angle = rng.random_range(0.0..TAU);
            let distance = rng.random_range(0.0..=radius);
            target = target.offset(DVec3::new(angle.cos() * distance, 0.0, angle.sin() * distance));
        }
        target
    }
}

/// Every spawn of one arena, in definition order.
#[derive(Debug, Clone, Default)]
pub struct SpawnBook {
    spawns: IndexMap<String, Spawn>,
}

fn index(key: &SpawnKey) -> String {
    key.to_string().to_ascii_lowercase()
}

fn qualifier_matches(spawn: Option<&str>, wanted: Option<&str>) -> Option<bool> {
    match (spawn, wanted) {
        (None, _) => Some(false),
        (Some(s), Some(w)) if s.eq_ignore_ascii_case(w) => Some(true),
        _ => None,
    }
}

impl SpawnBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a spawn. Returns the replaced one.
    pub fn set(&mut self, key: SpawnKey, location: Location, offset: Option<f64>) -> Option<Spawn> {
        self.spawns.insert(
            index(&key),
            Spawn {
                key,
                location,
                offset,
            },
        )
    }

    pub fn remove(&mut self, key: &SpawnKey) -> Option<Spawn> {
        self.spawns.shift_remove(&index(key))
    }

    /// Exact lookup; no partial matching, no fallback.
    pub fn exact(&self, team: Option<&str>, base: &str, class: Option<&str>) -> Option<&Location> {
        self.spawns
            .get(&index(&SpawnKey::new(team, base, class)))
            .map(|s| &s.location)
    }

    /// Candidate spawns for a request, most specific first.
    pub fn select(&self, team: Option<&str>, class: Option<&str>, base: &str) -> Vec<&Spawn> {
        let mut tiers: [Vec<&Spawn>; 4] = Default::default();
        for spawn in self.spawns.values().filter(|s| s.key.base_matches(base)) {
            let Some(by_team) = qualifier_matches(spawn.key.team.as_deref(), team) else {
                continue;
            };
            let Some(by_class) = qualifier_matches(spawn.key.class.as_deref(), class) else {
                continue;
            };
            let tier = match (by_team, by_class) {
                (true, true) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (false, false) => 3,
            };
            tiers[tier].push(spawn);
        }

        let mut rng = rand::rng();
        tiers
            .into_iter()
            .flat_map(|mut tier| {
                tier.shuffle(&mut rng);
                tier
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<SpawnKey> {
        self.spawns.values().map(|s| s.key.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spawn> {
        self.spawns.values()
    }

    pub fn len(&self) -> usize {
        self.spawns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty()
    }

    /// The mean position of the spawns in the first spawn's world.
    ///
    /// Stands in for the arena's center when it has no battle region.
    pub fn center(&self) -> Option<Location> {
        let world = &self.spawns.values().next()?.location.world;
        let positions: Vec<DVec3> = self
            .spawns
            .values()
            .filter(|s| &s.location.world == world)
            .map(|s| s.location.position())
            .collect();
        let mean = positions.iter().sum::<DVec3>() / positions.len() as f64;
        Some(Location::at(world.clone(), mean, 0.0, 0.0))
    }

    /// The persisted form: key → location string, key → scatter radius.
    pub fn to_maps(&self) -> (IndexMap<String, String>, IndexMap<String, f64>) {
        let locations = self
            .spawns
            .values()
            .map(|s| (s.key.to_string(), s.location.to_string()))
            .collect();
        let offsets = self
            .spawns
            .values()
            .filter_map(|s| s.offset.map(|o| (s.key.to_string(), o)))
            .collect();
        (locations, offsets)
    }

    /// Rebuilds a book from its persisted form. Entries that do not parse
    /// are skipped and returned with the reason.
    pub fn from_maps(
        locations: &IndexMap<String, String>,
        offsets: &IndexMap<String, f64>,
        teams: &[&str],
        classes: &[&str],
    ) -> (Self, Vec<(String, ProtocolError)>) {
        let mut book = Self::new();
        let mut rejected = Vec::new();
        for (raw_key, raw_location) in locations {
            let parsed = SpawnKey::parse(raw_key, teams, classes)
                .and_then(|key| Ok((key, raw_location.parse::<Location>()?)));
            match parsed {
                Ok((key, location)) => {
                    book.set(key, location, offsets.get(raw_key).copied());
                }
                Err(e) => rejected.push((raw_key.clone(), e)),
            }
        }
        (book, rejected)
    }
}

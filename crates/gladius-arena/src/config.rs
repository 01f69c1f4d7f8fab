//! Arena configuration and the arena phase machine.

use glam::DVec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ArenaConfig
// ---------------------------------------------------------------------------

/// A team as configured by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

impl TeamConfig {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

fn default_color() -> String {
    "white".to_string()
}

/// Configuration for one arena.
///
/// Every field has a default, so a stored config only needs the fields an
/// operator changed. Durations are in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// One implicit team instead of `teams`.
    pub free_for_all: bool,

    /// Fighters needed before a countdown may start. Also the number of
    /// `Ready` participants needed.
    pub min_players: usize,

    /// Maximum participants (0 = unlimited).
    pub max_players: usize,

    /// Maximum members per team (0 = unlimited).
    pub max_per_team: usize,

    /// Refuse to start while teams differ in size.
    pub even_teams: bool,

    /// Fraction of waiting participants that must be ready (0.0–1.0).
    pub ready_ratio: f64,

    /// Join straight onto the battlefield instead of the lounge. Also
    /// allows joining a fight that is already running.
    pub join_to_battle: bool,

    pub countdown_ticks: u64,

    /// Fight length limit (0 = no limit). On expiry the goal's timed scores
    /// decide the winners.
    pub match_duration_ticks: u64,

    /// Pause between the end of a fight and the reset (0 = immediate).
    pub end_delay_ticks: u64,

    pub nocamp_interval_ticks: u64,
    pub nocamp_damage: f64,
    /// Moving less than this far between checks counts as camping.
    pub nocamp_radius: f64,

    /// Added to every spawn location before teleporting.
    pub spawn_offset: DVec3,

    /// Refuse to start while another running arena's regions overlap ours.
    pub check_overlap: bool,

    /// Maximum distance from the arena a join may come from (0 = anywhere).
    pub join_radius: f64,

    /// Eliminated fighters spectate instead of being marked lost.
    pub spectate_on_death: bool,

    pub classes: Vec<String>,
    pub teams: Vec<TeamConfig>,

    /// Registry name of the goal engine.
    pub goal: String,
    /// Registry names of the behaviour modules.
    pub modules: Vec<String>,

    /// Permission that lets an actor join a locked arena.
    pub override_permission: String,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            free_for_all: true,
            min_players: 2,
            max_players: 8,
            max_per_team: 0,
            even_teams: false,
            ready_ratio: 1.0,
            join_to_battle: false,
            countdown_ticks: 100,
            match_duration_ticks: 0,
            end_delay_ticks: 60,
            nocamp_interval_ticks: 10,
            nocamp_damage: 1.0,
            nocamp_radius: 3.0,
            spawn_offset: DVec3::new(0.5, 0.0, 0.5),
            check_overlap: true,
            join_radius: 0.0,
            spectate_on_death: false,
            classes: Vec::new(),
            teams: Vec::new(),
            goal: "standard".to_string(),
            modules: Vec::new(),
            override_permission: "gladius.override".to_string(),
        }
    }
}

impl ArenaConfig {
    /// Name of the single team of a free-for-all arena.
    pub const FREE_TEAM: &'static str = "free";

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        self.min_players = self.min_players.max(1);
        self.ready_ratio = self.ready_ratio.clamp(0.0, 1.0);
        self.nocamp_interval_ticks = self.nocamp_interval_ticks.max(1);
        self
    }

    /// The teams an arena built from this config starts with.
    ///
    /// A teamed config without teams gets red and blue.
    pub fn team_configs(&self) -> Vec<TeamConfig> {
        if self.free_for_all {
            vec![TeamConfig::new(Self::FREE_TEAM, "white")]
        } else if self.teams.is_empty() {
            vec![TeamConfig::new("red", "red"), TeamConfig::new("blue", "blue")]
        } else {
            self.teams.clone()
        }
    }

    /// The configured class matching `name`, case-insensitively.
    pub fn class(&self, name: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// ArenaPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of an arena.
///
/// ```text
/// Setup → Open → CountingDown → Fight → Ending → Open
///                     │
///                     └──(below minimum)──→ Open
/// ```
///
/// - **Setup**: being built by an operator. Nobody can join.
/// - **Open**: the lounge is open; participants join and ready up.
/// - **CountingDown**: enough participants are ready; the countdown runs.
/// - **Fight**: the match is on.
/// - **Ending**: the match is decided; rewards and restoration follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArenaPhase {
    Setup,
    Open,
    CountingDown,
    Fight,
    Ending,
}

impl ArenaPhase {
    /// The regular successor of this phase.
    pub fn next(self) -> Self {
        match self {
            Self::Setup => Self::Open,
            Self::Open => Self::CountingDown,
            Self::CountingDown => Self::Fight,
            Self::Fight => Self::Ending,
            Self::Ending => Self::Open,
        }
    }

    /// Returns `true` if moving to `target` is allowed.
    ///
    /// Besides the regular successor, a countdown may fall back to `Open`.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target || (self == Self::CountingDown && target == Self::Open)
    }

    /// Returns `true` while new participants may join the lounge.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Open | Self::CountingDown)
    }

    /// Returns `true` once the arena has left setup and has not ended.
    pub fn is_running(self) -> bool {
        matches!(self, Self::CountingDown | Self::Fight)
    }
}

impl std::fmt::Display for ArenaPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Open => "open",
            Self::CountingDown => "counting down",
            Self::Fight => "fight",
            Self::Ending => "ending",
        };
        f.write_str(name)
    }
}

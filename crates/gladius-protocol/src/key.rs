//! Spawn keys: the `(team_)base(_class)` naming scheme.
//!
//! A spawn is stored under a single name such as `red_spawn2_archer`. The
//! team and class segments are only recognised when they match a team or
//! class the arena actually knows about; anything else stays part of the
//! base name. Matching is case-insensitive, but the original text of every
//! segment is kept so that formatting a parsed key reproduces its input.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A structured spawn name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpawnKey {
    pub team: Option<String>,
    pub base: String,
    pub class: Option<String>,
}

impl SpawnKey {
    /// Creates a key from its parts.
    pub fn new(team: Option<&str>, base: impl Into<String>, class: Option<&str>) -> Self {
        Self {
            team: team.map(str::to_string),
            base: base.into(),
            class: class.map(str::to_string),
        }
    }

    /// A key with neither team nor class.
    pub fn base(base: impl Into<String>) -> Self {
        Self::new(None, base, None)
    }

    /// Parses a persisted key against the arena's known teams and classes.
    ///
    /// A leading segment counts as a team only when it names a known team
    /// and at least one segment remains for the base; a trailing segment
    /// counts as a class under the same rule. Unrecognised segments are
    /// kept in the base instead of being dropped.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidSpawnKey`] when the base would be empty.
    pub fn parse(raw: &str, teams: &[&str], classes: &[&str]) -> Result<Self, ProtocolError> {
        let segments: Vec<&str> = raw.split('_').collect();
        let mut start = 0;
        let mut end = segments.len();

        let mut team = None;
        if end - start >= 2 && teams.iter().any(|t| t.eq_ignore_ascii_case(segments[start])) {
            team = Some(segments[start].to_string());
            start += 1;
        }

        let mut class = None;
        if end - start >= 2 && classes.iter().any(|c| c.eq_ignore_ascii_case(segments[end - 1])) {
            class = Some(segments[end - 1].to_string());
            end -= 1;
        }

        let base = segments[start..end].join("_");
        if base.is_empty() {
            return Err(ProtocolError::InvalidSpawnKey(raw.to_string()));
        }

        Ok(Self { team, base, class })
    }

    /// Whether this key's base starts with `prefix` (case-insensitive).
    ///
    /// Spawns are looked up by partial base match so that `spawn1`,
    /// `spawn2`, ... all answer a request for `spawn`.
    pub fn base_matches(&self, prefix: &str) -> bool {
        self.base.len() >= prefix.len()
            && self.base.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }

    /// Whether team and class equal the given qualifiers (case-insensitive).
    pub fn qualified_as(&self, team: Option<&str>, class: Option<&str>) -> bool {
        fn same(a: Option<&str>, b: Option<&str>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            }
        }
        same(self.team.as_deref(), team) && same(self.class.as_deref(), class)
    }
}

impl fmt::Display for SpawnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(team) = &self.team {
            write!(f, "{team}_")?;
        }
        f.write_str(&self.base)?;
        if let Some(class) = &self.class {
            write!(f, "_{class}")?;
        }
        Ok(())
    }
}

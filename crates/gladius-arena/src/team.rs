//! Teams: named, colored member lists.

use gladius_protocol::ActorId;

use crate::TeamConfig;

/// A team inside one arena.
///
/// Members are kept in join order; the order breaks ties when the arena has
/// to pick between members or teams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub color: String,
    members: Vec<ActorId>,
}

impl Team {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            members: Vec::new(),
        }
    }

    /// Adds `actor` at the end. Returns `false` if already a member.
    pub fn add(&mut self, actor: ActorId) -> bool {
        if self.contains(actor) {
            return false;
        }
        self.members.push(actor);
        true
    }

    pub fn remove(&mut self, actor: ActorId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != actor);
        self.members.len() != before
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.members.contains(&actor)
    }

    pub fn members(&self) -> &[ActorId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }
}

impl From<TeamConfig> for Team {
    fn from(config: TeamConfig) -> Self {
        Self::new(config.name, config.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_join_order_and_rejects_duplicates() {
        let mut team = Team::new("red", "red");
        assert!(team.add(ActorId(2)));
        assert!(team.add(ActorId(1)));
        assert!(!team.add(ActorId(2)));
        assert_eq!(team.members(), &[ActorId(2), ActorId(1)]);
    }

    #[test]
    fn test_remove_missing_member_returns_false() {
        let mut team = Team::new("red", "red");
        team.add(ActorId(1));
        assert!(!team.remove(ActorId(9)));
        assert!(team.remove(ActorId(1)));
        assert!(team.is_empty());
    }
}

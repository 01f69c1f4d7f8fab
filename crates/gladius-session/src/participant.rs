//! Participant types: the record Gladius keeps for each connected actor.
//!
//! A participant tracks:
//! - WHO the actor is (`ActorId`)
//! - WHERE they are in a match (`ParticipantStatus`)
//! - WHICH arena, team and class they belong to
//! - WHAT to give back when they leave (`SavedState`)

use gladius_protocol::{ActorId, Location};
use serde::{Deserialize, Serialize};

use crate::SessionError;

// ---------------------------------------------------------------------------
// ParticipantStatus
// ---------------------------------------------------------------------------

/// A participant's individual state inside a match.
///
/// ```text
///   None ──→ Lounge ──→ Ready ──→ Fight ──→ Dead ──┐
///     │         │                  ↑  │            │
///     │         └───────(direct)───┤  ├──→ Lost ───┤
///     │                            │  │            │
///     └──────────→ Watch ←─────────┼──┘            │
///                                  └──(respawn)────┘
/// ```
///
/// - **Lounge** / **Ready**: waiting for the fight; `Ready` counts towards
///   the ready threshold.
/// - **Fight**: in the battle; the only status region flags apply to.
/// - **Dead**: died, waiting to be respawned.
/// - **Lost**: eliminated. The goal may still bring them back.
/// - **Watch**: spectating, either by choice or after elimination.
///
/// Every status may go back to `None` (leave, kick, reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    #[default]
    None,
    Lounge,
    Ready,
    Fight,
    Dead,
    Watch,
    Lost,
}

impl ParticipantStatus {
    /// Whether the sub-state machine allows `self → next`.
    pub fn can_transition_to(self, next: ParticipantStatus) -> bool {
        use ParticipantStatus::*;
        matches!(
            (self, next),
            (_, None)
                | (None, Lounge | Fight | Watch)
                | (Lounge, Ready | Fight | Watch)
                | (Ready, Lounge | Fight | Watch)
                | (Fight, Dead | Watch | Lost)
                | (Dead, Fight | Lost | Watch)
                | (Lost, Fight | Watch)
        )
    }

    /// Still taking part in the fight (alive or waiting to respawn).
    pub fn is_fighting(self) -> bool {
        matches!(self, Self::Fight | Self::Dead)
    }

    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Lounge | Self::Ready)
    }
}

// ---------------------------------------------------------------------------
// SavedState
// ---------------------------------------------------------------------------

/// What an actor had before joining, handed back on leave.
///
/// `payload` is opaque host data (inventory, health, experience...);
/// Gladius only stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub location: Location,
    #[serde(default)]
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// One connected actor as seen by Gladius.
///
/// `arena` is set exactly while the participant is a member of one of that
/// arena's teams. Spectators are never team members: they use `watching`.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ActorId,
    status: ParticipantStatus,
    pub arena: Option<String>,
    pub team: Option<String>,
    pub class: Option<String>,
    pub saved: Option<SavedState>,
    /// Lets the actor teleport through regions that protect against it.
    pub telepass: bool,
    pub last_location: Option<Location>,
    pub watching: Option<String>,
}

impl Participant {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            status: ParticipantStatus::None,
            arena: None,
            team: None,
            class: None,
            saved: None,
            telepass: false,
            last_location: None,
            watching: None,
        }
    }

    pub fn status(&self) -> ParticipantStatus {
        self.status
    }

    /// Moves to `next` and returns the previous status.
    ///
    /// Setting the current status again is accepted and changes nothing.
    ///
    /// # Errors
    /// [`SessionError::IllegalTransition`] when the step is not allowed.
    pub fn set_status(&mut self, next: ParticipantStatus) -> Result<ParticipantStatus, SessionError> {
        let from = self.status;
        if from != next && !from.can_transition_to(next) {
            return Err(SessionError::IllegalTransition {
                actor: self.id,
                from,
                to: next,
            });
        }
        self.status = next;
        if from != next {
            tracing::debug!(actor = %self.id, ?from, to = ?next, "status changed");
        }
        Ok(from)
    }

    /// Whether the actor belongs to any arena, as fighter or spectator.
    pub fn is_busy(&self) -> bool {
        self.arena.is_some() || self.watching.is_some()
    }

    /// Forgets everything match related. Returns the saved state so the
    /// caller can hand it back to the host.
    pub fn reset(&mut self) -> Option<SavedState> {
        self.status = ParticipantStatus::None;
        self.arena = None;
        self.team = None;
        self.class = None;
        self.telepass = false;
        self.watching = None;
        self.saved.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_transition_follows_lifecycle() {
        use ParticipantStatus::*;
        assert!(None.can_transition_to(Lounge));
        assert!(Lounge.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Fight));
        assert!(Fight.can_transition_to(Lost));
        assert!(Lost.can_transition_to(Fight));
        assert!(Dead.can_transition_to(Fight));
        assert!(None.can_transition_to(Watch));
    }

    #[test]
    fn test_can_transition_rejects_skips() {
        use ParticipantStatus::*;
        assert!(!None.can_transition_to(Ready));
        assert!(!Lounge.can_transition_to(Dead));
        assert!(!Watch.can_transition_to(Fight));
        assert!(!Lost.can_transition_to(Lounge));
    }

    #[test]
    fn test_every_status_can_leave() {
        use ParticipantStatus::*;
        for s in [None, Lounge, Ready, Fight, Dead, Watch, Lost] {
            assert!(s.can_transition_to(None));
        }
    }

    #[test]
    fn test_set_status_illegal_keeps_old_status() {
        let mut p = Participant::new(ActorId(1));
        let err = p.set_status(ParticipantStatus::Dead).unwrap_err();
        assert!(matches!(err, SessionError::IllegalTransition { .. }));
        assert_eq!(p.status(), ParticipantStatus::None);
    }

    #[test]
    fn test_set_status_same_status_is_noop() {
        let mut p = Participant::new(ActorId(1));
        p.set_status(ParticipantStatus::Lounge).unwrap();
        assert_eq!(p.set_status(ParticipantStatus::Lounge).unwrap(), ParticipantStatus::Lounge);
    }

    #[test]
    fn test_reset_returns_saved_state() {
        let mut p = Participant::new(ActorId(7));
        p.arena = Some("colosseum".into());
        p.team = Some("red".into());
        p.saved = Some(SavedState {
            location: Location::new("lobby", 0.0, 64.0, 0.0),
            payload: vec![1, 2, 3],
        });
        p.set_status(ParticipantStatus::Fight).unwrap();

        let saved = p.reset().unwrap();
        assert_eq!(saved.payload, vec![1, 2, 3]);
        assert_eq!(p.status(), ParticipantStatus::None);
        assert!(!p.is_busy());
        assert!(p.team.is_none());
        assert!(p.saved.is_none());
    }
}

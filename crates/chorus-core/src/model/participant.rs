// ── Participant domain types ──

use serde::Serialize;

use chorus_sdk::{EntityId, ParticipantPayload, PresenceState};

/// Participant presence, ordered by rank like [`MessageStatus`](super::MessageStatus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParticipantStatus {
    Joining,
    Connected,
    /// Removed or left. Kept as a tombstone so a stale "added" event
    /// cannot bring the participant back.
    Disconnected,
}

impl ParticipantStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Joining => 0,
            Self::Connected => 1,
            Self::Disconnected => 2,
        }
    }

    pub fn is_present(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl From<PresenceState> for ParticipantStatus {
    fn from(presence: PresenceState) -> Self {
        match presence {
            PresenceState::Joining => Self::Joining,
            PresenceState::Connected => Self::Connected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: EntityId,
    pub display_name: Option<String>,
    pub status: ParticipantStatus,
    pub sequence: u64,
}

impl Participant {
    pub fn from_payload(payload: &ParticipantPayload, sequence: u64) -> Self {
        Self {
            id: payload.id.clone(),
            display_name: payload.display_name.clone(),
            status: payload.presence.into(),
            sequence,
        }
    }

    /// A removal record for a participant we never saw being added.
    pub fn departed(id: EntityId, sequence: u64) -> Self {
        Self {
            id,
            display_name: None,
            status: ParticipantStatus::Disconnected,
            sequence,
        }
    }
}

//! Championship participant record and registration draft.

use serde::{Deserialize, Serialize};

use crate::types::{Average, Participation, ParticipantId, Scope};

/// One entry of a ranked class list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable participant identifier.
    pub id: ParticipantId,
    /// Class list this participant is on.
    pub scope: Scope,
    /// Opaque member/bow reference from the registration layer.
    pub member_ref: String,
    /// 0 when not selected, otherwise the compacted qualification position.
    pub rank: u32,
    /// Position in the full list (1..N), including withdrawn participants.
    pub order: u32,
    /// Score average; the key for reserve promotion and re-insertion.
    pub average: Average,
    /// Attendance state.
    pub participation: Participation,
    /// Non-empty for regional champions.
    pub champion_label: String,
}

impl Participant {
    /// True when this participant holds a guaranteed champion slot.
    pub fn is_champion(&self) -> bool {
        !self.champion_label.is_empty()
    }

    /// True when the participant currently qualifies.
    pub fn is_qualified(&self) -> bool {
        self.rank > 0
    }

    /// Eligible but outside the qualifying ranks.
    pub fn is_reserve(&self) -> bool {
        self.rank == 0 && self.participation.is_eligible()
    }
}

/// Registration payload used to add a participant to a class.
///
/// New participants are appended at the end of the order with rank 0; an
/// `OPSTELLEN` mutation builds the real order afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDraft {
    /// Class list to join.
    pub scope: Scope,
    /// Opaque member/bow reference.
    pub member_ref: String,
    /// Score average.
    pub average: Average,
    /// Initial attendance state.
    pub participation: Participation,
    /// Non-empty for regional champions.
    pub champion_label: String,
}

impl ParticipantDraft {
    pub(crate) fn into_participant(self, id: ParticipantId, order: u32) -> Participant {
        Participant {
            id,
            scope: self.scope,
            member_ref: self.member_ref,
            rank: 0,
            order,
            average: self.average,
            participation: self.participation,
            champion_label: self.champion_label,
        }
    }
}

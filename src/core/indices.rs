use hashbrown::HashMap;

use crate::types::{ParticipantId, Scope};

/// Participant ids grouped by key.
pub type VecIndex<K> = HashMap<K, Vec<ParticipantId>>;

/// Participants per class, in registration order.
pub type ScopeIndex = VecIndex<Scope>;

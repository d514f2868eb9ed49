use hashbrown::HashMap;

use crate::{
    engine::ranked_class::RankedClass,
    participant::{Participant, ParticipantDraft},
    types::{ParticipantId, RoundId, Scope},
};

use super::indices::ScopeIndex;

/// In-memory participant table with a per-class index and cut limits.
#[derive(Debug, Default)]
pub struct ParticipantTable {
    records: HashMap<ParticipantId, Participant>,
    by_scope: ScopeIndex,
    limits: HashMap<Scope, u32>,
    next_id: ParticipantId,
}

impl ParticipantTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Appends a participant to the end of its class with rank 0.
    pub fn register(&mut self, draft: ParticipantDraft) -> ParticipantId {
        let id = self.next_id;
        self.next_id += 1;

        let members = self.by_scope.entry(draft.scope).or_default();
        let order = members.len() as u32 + 1;
        members.push(id);
        self.records.insert(id, draft.into_participant(id, order));
        id
    }

    /// Looks up a participant.
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.records.get(&id)
    }

    /// Cut limit of a class, if set.
    pub fn limit(&self, scope: Scope) -> Option<u32> {
        self.limits.get(&scope).copied()
    }

    /// Copies a class list out of the table.
    pub fn load_class(&self, scope: Scope) -> RankedClass {
        let entries = self
            .by_scope
            .get(&scope)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        RankedClass::new(scope, self.limit(scope), entries)
    }

    /// Writes a class list and its limit back.
    pub fn save_class(&mut self, class: &RankedClass) {
        let scope = class.scope();
        match class.limit() {
            Some(limit) => {
                self.limits.insert(scope, limit);
            }
            None => {
                self.limits.remove(&scope);
            }
        }

        let members = self.by_scope.entry(scope).or_default();
        for p in class.participants() {
            if !members.contains(&p.id) {
                members.push(p.id);
            }
            self.records.insert(p.id, p.clone());
        }
    }

    /// Classes of `round`, ascending.
    pub fn scopes_in_round(&self, round: RoundId) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self
            .by_scope
            .keys()
            .copied()
            .filter(|s| s.round == round)
            .collect();
        scopes.sort();
        scopes
    }
}

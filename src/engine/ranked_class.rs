//! Order and rank maintenance for one class list.
//!
//! A class keeps two numbers per participant:
//!
//! - `order` is the position in the complete list, a permutation of `1..=N`
//!   that includes withdrawn participants;
//! - `rank` is the compacted qualification position `1..=K`, or 0 for everyone
//!   outside the qualifying group.
//!
//! Rank is always a function of order: walking the list by order, every
//! participant that has not withdrawn gets the next rank until the cut limit is
//! reached. Operations therefore move participants around in the order and then
//! recompute ranks.

use std::cmp::Ordering;

use crate::{
    participant::Participant,
    types::{Participation, ParticipantId, Scope},
};

/// Errors raised by list operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankingError {
    /// The participant is not on this class list.
    #[error("participant {participant} is not on class list {scope}")]
    NotInClass {
        /// Requested participant.
        participant: ParticipantId,
        /// Class that was searched.
        scope: Scope,
    },
    /// The list violates the order/rank invariants.
    #[error("class {scope} is inconsistent: {detail}")]
    Invariant {
        /// Offending class.
        scope: Scope,
        /// What is wrong.
        detail: String,
    },
}

/// Result of [`RankedClass::apply_cut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutOutcome {
    /// The requested limit equals the current one.
    Unchanged,
    /// The limit changed and ranks were recomputed.
    Changed {
        /// Previous limit.
        old: Option<u32>,
        /// New limit.
        new: Option<u32>,
    },
}

/// Result of [`RankedClass::withdraw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    /// The participant had already withdrawn.
    AlreadyWithdrawn,
    /// The participant withdrew.
    Withdrawn {
        /// Rank held before withdrawing (0 for a reserve).
        previous_rank: u32,
        /// Reserve that moved into the qualifying group, if any.
        promoted: Option<ParticipantId>,
    },
}

/// Result of [`RankedClass::confirm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Participation was already confirmed.
    AlreadyConfirmed,
    /// An unanswered participant confirmed; position unchanged.
    Confirmed,
    /// A withdrawn participant registered again and was placed by average.
    Reinserted {
        /// New order.
        order: u32,
        /// Rank after placement.
        rank: u32,
    },
}

/// All participants of one `(round, class)` scope, kept sorted by order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedClass {
    scope: Scope,
    limit: Option<u32>,
    entries: Vec<Participant>,
}

impl RankedClass {
    /// Builds a class from stored rows.
    ///
    /// Rows are sorted by their stored order (participant id breaks ties) and
    /// renumbered to `1..=N`. Ranks are left as stored; every operation
    /// recomputes them before use.
    pub fn new(scope: Scope, limit: Option<u32>, mut entries: Vec<Participant>) -> Self {
        entries.sort_by_key(|p| (p.order, p.id));
        let mut class = Self {
            scope,
            limit,
            entries,
        };
        class.renumber();
        class
    }

    /// Scope of this list.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Current cut limit; `None` means everyone eligible qualifies.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Participants sorted by order.
    pub fn participants(&self) -> &[Participant] {
        &self.entries
    }

    /// Consumes the list and returns the participants sorted by order.
    pub fn into_participants(self) -> Vec<Participant> {
        self.entries
    }

    /// Looks up one participant.
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Number of participants, withdrawn ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the list has no participants.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of participants holding a rank.
    pub fn qualified_count(&self) -> usize {
        self.entries.iter().filter(|p| p.is_qualified()).count()
    }

    /// Assigns ranks from the current order and returns how many changed.
    pub fn recompute_ranks(&mut self) -> usize {
        let limit = self.effective_limit();
        let mut next = 0usize;
        let mut changed = 0;
        for p in &mut self.entries {
            let rank = if p.participation.is_eligible() && next < limit {
                next += 1;
                next as u32
            } else {
                0
            };
            if p.rank != rank {
                p.rank = rank;
                changed += 1;
            }
        }
        changed
    }

    /// Sets or deletes the cut limit.
    ///
    /// The order is never touched, so raising and lowering the limit again
    /// restores the previous ranks.
    pub fn apply_cut(&mut self, new_limit: Option<u32>) -> CutOutcome {
        if self.limit == new_limit {
            return CutOutcome::Unchanged;
        }
        let old = std::mem::replace(&mut self.limit, new_limit);
        self.recompute_ranks();
        CutOutcome::Changed {
            old,
            new: new_limit,
        }
    }

    /// Withdraws a participant.
    ///
    /// The participant keeps its order and loses its rank. When it was
    /// qualified, the best reserve (highest average, lowest order on ties) is
    /// promoted: it moves in front of the first qualifier with a strictly
    /// lower average, or in front of the first reserve when there is none.
    pub fn withdraw(&mut self, id: ParticipantId) -> Result<WithdrawOutcome, RankingError> {
        self.recompute_ranks();
        let idx = self.position(id)?;
        let participant = &mut self.entries[idx];
        if !participant.participation.is_eligible() {
            return Ok(WithdrawOutcome::AlreadyWithdrawn);
        }

        let previous_rank = participant.rank;
        participant.participation = Participation::No;
        participant.rank = 0;

        let promoted = if previous_rank > 0 {
            self.promote_best_reserve()
        } else {
            None
        };
        self.recompute_ranks();

        let promoted = promoted.filter(|id| self.get(*id).is_some_and(Participant::is_qualified));
        Ok(WithdrawOutcome::Withdrawn {
            previous_rank,
            promoted,
        })
    }

    /// Confirms participation.
    ///
    /// Unanswered participants keep their position. A withdrawn participant is
    /// taken out of its slot and placed by average: behind the last reserve with
    /// an equal or higher average when the qualifying group is full, otherwise
    /// behind the last eligible participant with an equal or higher average.
    pub fn confirm(&mut self, id: ParticipantId) -> Result<ConfirmOutcome, RankingError> {
        self.recompute_ranks();
        let idx = self.position(id)?;
        match self.entries[idx].participation {
            Participation::Yes => Ok(ConfirmOutcome::AlreadyConfirmed),
            Participation::Unknown => {
                self.entries[idx].participation = Participation::Yes;
                Ok(ConfirmOutcome::Confirmed)
            }
            Participation::No => {
                let target = self.reinsert(idx);
                let placed = &self.entries[target];
                Ok(ConfirmOutcome::Reinserted {
                    order: placed.order,
                    rank: placed.rank,
                })
            }
        }
    }

    /// Builds the initial order of a freshly imported list.
    ///
    /// Champions are always selected. Non-champions join by average until the
    /// number of eligible selected participants reaches the limit. The
    /// selection is ordered by average, the rest follows by average.
    pub fn seed(&mut self) {
        let limit = self.effective_limit();
        let (mut selected, mut others): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(Participant::is_champion);
        others.sort_by(by_average_desc);

        let mut eligible = selected
            .iter()
            .filter(|p| p.participation.is_eligible())
            .count();
        let mut rest = Vec::new();
        for p in others {
            if eligible < limit {
                if p.participation.is_eligible() {
                    eligible += 1;
                }
                selected.push(p);
            } else {
                rest.push(p);
            }
        }

        selected.sort_by(by_average_desc);
        selected.extend(rest);
        self.entries = selected;
        self.renumber();
        self.recompute_ranks();
    }

    /// Checks the order bijection and rank compaction.
    pub fn check_invariants(&self) -> Result<(), RankingError> {
        let violation = |detail: String| RankingError::Invariant {
            scope: self.scope,
            detail,
        };

        let mut expected_rank = 0u32;
        let mut eligible = 0usize;
        for (idx, p) in self.entries.iter().enumerate() {
            if p.scope != self.scope {
                return Err(violation(format!("participant {} belongs to {}", p.id, p.scope)));
            }
            if p.order as usize != idx + 1 {
                return Err(violation(format!(
                    "participant {} has order {} at position {}",
                    p.id,
                    p.order,
                    idx + 1
                )));
            }
            if p.participation.is_eligible() {
                eligible += 1;
            } else if p.rank > 0 {
                return Err(violation(format!("withdrawn participant {} has rank {}", p.id, p.rank)));
            }
            if p.rank > 0 {
                expected_rank += 1;
                if p.rank != expected_rank {
                    return Err(violation(format!(
                        "participant {} has rank {} where {} was expected",
                        p.id, p.rank, expected_rank
                    )));
                }
            }
        }

        let expected = eligible.min(self.effective_limit());
        if expected_rank as usize != expected {
            return Err(violation(format!(
                "{expected_rank} ranked participants where {expected} were expected"
            )));
        }
        Ok(())
    }

    fn effective_limit(&self) -> usize {
        self.limit.map_or(usize::MAX, |l| l as usize)
    }

    fn position(&self, id: ParticipantId) -> Result<usize, RankingError> {
        self.entries
            .iter()
            .position(|p| p.id == id)
            .ok_or(RankingError::NotInClass {
                participant: id,
                scope: self.scope,
            })
    }

    fn renumber(&mut self) {
        for (idx, p) in self.entries.iter_mut().enumerate() {
            p.order = idx as u32 + 1;
        }
    }

    fn promote_best_reserve(&mut self) -> Option<ParticipantId> {
        let (best_idx, best) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_reserve())
            .max_by(|(_, a), (_, b)| a.average.cmp(&b.average).then(b.order.cmp(&a.order)))?;
        let (best_id, best_average) = (best.id, best.average);

        let first_reserve = self
            .entries
            .iter()
            .position(Participant::is_reserve)
            .unwrap_or(best_idx);
        let target = self.entries[..best_idx]
            .iter()
            .position(|p| p.is_qualified() && p.average < best_average)
            .unwrap_or(first_reserve);

        if target < best_idx {
            let moved = self.entries.remove(best_idx);
            self.entries.insert(target, moved);
            self.renumber();
        }
        Some(best_id)
    }

    fn reinsert(&mut self, idx: usize) -> usize {
        let mut p = self.entries.remove(idx);
        p.participation = Participation::Yes;
        p.rank = 0;

        // ranks are unaffected by the removal: a withdrawn participant holds none
        let zone_start = if self.qualified_count() >= self.effective_limit() {
            self.entries
                .iter()
                .rposition(Participant::is_qualified)
                .map_or(0, |i| i + 1)
        } else {
            0
        };
        let target = self.entries[zone_start..]
            .iter()
            .rposition(|e| e.participation.is_eligible() && e.average >= p.average)
            .map_or(zone_start, |i| zone_start + i + 1);

        self.entries.insert(target, p);
        self.renumber();
        self.recompute_ranks();
        target
    }
}

fn by_average_desc(a: &Participant, b: &Participant) -> Ordering {
    b.average.cmp(&a.average)
}

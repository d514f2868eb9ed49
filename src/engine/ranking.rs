//! Handler for the ranking queue.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    mutation::{Mutation, MutationRecord},
    persist::RankingRepository,
    types::{ParticipantId, Participation, RoundId, Scope},
};

use super::{
    ranked_class::{ConfirmOutcome, CutOutcome, RankedClass, WithdrawOutcome},
    traits::{Handled, HandlerError, MutationHandler, Notification, Notifier},
};

/// Applies `INITIEEL`, `OPSTELLEN`, `CUT`, `AFMELDEN` and `BEVESTIGEN`.
///
/// Each mutation loads the class fresh, so consecutive mutations in one pass
/// see each other's effects.
pub struct RankingHandler {
    repo: Arc<dyn RankingRepository>,
    notifier: Arc<dyn Notifier>,
}

impl RankingHandler {
    /// Creates a handler over `repo`.
    pub fn new(repo: Arc<dyn RankingRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { repo, notifier }
    }

    fn recompute_round(&self, round: RoundId) -> Result<(), HandlerError> {
        let scopes = self.repo.scopes_in_round(round)?;
        for scope in scopes {
            let mut class = self.repo.load_class(scope)?;
            let changed = class.recompute_ranks();
            debug!(%scope, changed, "ranks recomputed");
            self.save(&class)?;
        }
        Ok(())
    }

    fn seed(&self, scope: Scope) -> Result<(), HandlerError> {
        let mut class = self.repo.load_class(scope)?;
        class.seed();
        info!(%scope, participants = class.len(), "class list seeded");
        self.save(&class)
    }

    fn cut(&self, scope: Scope, new_limit: Option<u32>) -> Result<(), HandlerError> {
        let mut class = self.repo.load_class(scope)?;
        match class.apply_cut(new_limit) {
            CutOutcome::Unchanged => {
                info!(%scope, ?new_limit, "cut unchanged");
                Ok(())
            }
            CutOutcome::Changed { old, new } => {
                info!(%scope, ?old, ?new, "cut changed");
                self.save(&class)
            }
        }
    }

    fn withdraw(&self, id: ParticipantId) -> Result<(), HandlerError> {
        let mut class = self.class_of(id)?;
        match class.withdraw(id)? {
            WithdrawOutcome::AlreadyWithdrawn => {
                warn!(participant = id, "participant had already withdrawn");
                self.save(&class)
            }
            WithdrawOutcome::Withdrawn {
                previous_rank,
                promoted,
            } => {
                info!(participant = id, previous_rank, ?promoted, "participant withdrew");
                self.save(&class)?;
                self.notifier.notify(Notification::ParticipationChanged {
                    scope: class.scope(),
                    participant: id,
                    participation: Participation::No,
                });
                if let Some(reserve) = promoted.and_then(|p| class.get(p)) {
                    self.notifier.notify(Notification::ReservePromoted {
                        scope: class.scope(),
                        participant: reserve.id,
                        rank: reserve.rank,
                    });
                }
                Ok(())
            }
        }
    }

    fn confirm(&self, id: ParticipantId) -> Result<(), HandlerError> {
        let mut class = self.class_of(id)?;
        let outcome = class.confirm(id)?;
        match outcome {
            ConfirmOutcome::AlreadyConfirmed => {
                debug!(participant = id, "participation already confirmed");
                return Ok(());
            }
            ConfirmOutcome::Confirmed => info!(participant = id, "participation confirmed"),
            ConfirmOutcome::Reinserted { order, rank } => {
                info!(participant = id, order, rank, "participant registered again")
            }
        }
        self.save(&class)?;
        self.notifier.notify(Notification::ParticipationChanged {
            scope: class.scope(),
            participant: id,
            participation: Participation::Yes,
        });
        Ok(())
    }

    fn class_of(&self, id: ParticipantId) -> Result<RankedClass, HandlerError> {
        let participant = self
            .repo
            .participant(id)?
            .ok_or(HandlerError::MissingParticipant(id))?;
        Ok(self.repo.load_class(participant.scope)?)
    }

    fn save(&self, class: &RankedClass) -> Result<(), HandlerError> {
        class.check_invariants()?;
        self.repo.save_class(class)?;
        Ok(())
    }
}

impl MutationHandler for RankingHandler {
    fn name(&self) -> &'static str {
        "ranking"
    }

    fn handle(
        &mut self,
        _record: &MutationRecord,
        mutation: &Mutation,
    ) -> Result<Handled, HandlerError> {
        match mutation {
            Mutation::Initial { round } => self.recompute_round(*round)?,
            Mutation::Seed { scope } => self.seed(*scope)?,
            Mutation::Cut { scope, new_limit } => self.cut(*scope, *new_limit)?,
            Mutation::Withdraw { participant } => self.withdraw(*participant)?,
            Mutation::Confirm { participant } => self.confirm(*participant)?,
            _ => return Ok(Handled::NotMine),
        }
        Ok(Handled::Done)
    }
}

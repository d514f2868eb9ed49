//! In-memory backend for tests and single-process deployments.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    booking::Booking,
    core::{ledger::BookingLedger, log::MutationLog, table::ParticipantTable},
    engine::ranked_class::RankedClass,
    mutation::{MutationRecord, NewMutation},
    participant::{Participant, ParticipantDraft},
    types::{BookingNr, MutationId, ParticipantId, QueueKind, RoundId, Scope},
};

use super::{
    check_queue, now_ms, MutationStore, PaymentRepository, PersistError, PersistResult,
    RankingRepository,
};

#[derive(Debug)]
struct Tables {
    ranking_log: MutationLog,
    payment_log: MutationLog,
    participants: ParticipantTable,
    bookings: BookingLedger,
}

impl Tables {
    fn log(&self, queue: QueueKind) -> &MutationLog {
        match queue {
            QueueKind::Ranking => &self.ranking_log,
            QueueKind::Payment => &self.payment_log,
        }
    }

    fn log_mut(&mut self, queue: QueueKind) -> &mut MutationLog {
        match queue {
            QueueKind::Ranking => &mut self.ranking_log,
            QueueKind::Payment => &mut self.payment_log,
        }
    }
}

/// Shared in-memory tables. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables {
                ranking_log: MutationLog::new(QueueKind::Ranking),
                payment_log: MutationLog::new(QueueKind::Payment),
                participants: ParticipantTable::new(),
                bookings: BookingLedger::new(),
            })),
        }
    }

    /// Mutation log of one queue, sharing these tables.
    pub fn mutation_log(&self, queue: QueueKind) -> MemoryMutationLog {
        MemoryMutationLog {
            queue,
            tables: Arc::clone(&self.tables),
        }
    }
}

/// [`MutationStore`] view on one queue of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryMutationLog {
    queue: QueueKind,
    tables: Arc<Mutex<Tables>>,
}

impl MutationStore for MemoryMutationLog {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn enqueue(&self, new: NewMutation) -> PersistResult<MutationId> {
        check_queue(self.queue, &new)?;
        Ok(self.tables.lock().log_mut(self.queue).append(new, now_ms()))
    }

    fn find_pending(&self, new: &NewMutation) -> PersistResult<Option<MutationId>> {
        Ok(self.tables.lock().log(self.queue).find_pending(new))
    }

    fn enqueue_unique(&self, new: NewMutation) -> PersistResult<(MutationId, bool)> {
        check_queue(self.queue, &new)?;
        // lookup and append under one lock
        let mut tables = self.tables.lock();
        let log = tables.log_mut(self.queue);
        if let Some(id) = log.find_pending(&new) {
            return Ok((id, false));
        }
        Ok((log.append(new, now_ms()), true))
    }

    fn get(&self, id: MutationId) -> PersistResult<Option<MutationRecord>> {
        Ok(self.tables.lock().log(self.queue).get(id).cloned())
    }

    fn fetch_unprocessed_since(&self, last_id: MutationId) -> PersistResult<Vec<MutationRecord>> {
        Ok(self.tables.lock().log(self.queue).unprocessed_since(last_id))
    }

    fn mark_processed(&self, id: MutationId) -> PersistResult<()> {
        self.tables
            .lock()
            .log_mut(self.queue)
            .mark_processed(id)
            .map_err(|_| PersistError::MissingMutation(id))
    }

    fn count(&self) -> PersistResult<u64> {
        Ok(self.tables.lock().log(self.queue).len() as u64)
    }
}

impl RankingRepository for MemoryStore {
    fn register(&self, draft: ParticipantDraft) -> PersistResult<ParticipantId> {
        Ok(self.tables.lock().participants.register(draft))
    }

    fn participant(&self, id: ParticipantId) -> PersistResult<Option<Participant>> {
        Ok(self.tables.lock().participants.get(id).cloned())
    }

    fn load_class(&self, scope: Scope) -> PersistResult<RankedClass> {
        Ok(self.tables.lock().participants.load_class(scope))
    }

    fn save_class(&self, class: &RankedClass) -> PersistResult<()> {
        self.tables.lock().participants.save_class(class);
        Ok(())
    }

    fn scopes_in_round(&self, round: RoundId) -> PersistResult<Vec<Scope>> {
        Ok(self.tables.lock().participants.scopes_in_round(round))
    }
}

impl PaymentRepository for MemoryStore {
    fn next_booking_nr(&self) -> PersistResult<BookingNr> {
        Ok(self.tables.lock().bookings.next_nr())
    }

    fn create_booking(&self, amount_cents: u64) -> PersistResult<Booking> {
        Ok(self.tables.lock().bookings.create(amount_cents, now_ms()))
    }

    fn booking(&self, nr: BookingNr) -> PersistResult<Option<Booking>> {
        Ok(self.tables.lock().bookings.get(nr).cloned())
    }

    fn booking_by_payment(&self, payment_id: &str) -> PersistResult<Option<Booking>> {
        Ok(self.tables.lock().bookings.by_payment(payment_id).cloned())
    }

    fn save_booking(&self, booking: &Booking) -> PersistResult<()> {
        self.tables.lock().bookings.save(booking);
        Ok(())
    }
}

//! Storage traits shared by producers, the consumer and the engines.
//!
//! Every trait takes `&self`; implementations serialize access internally so a
//! single store can be shared between producer tasks and the consumer.

/// In-memory backend.
pub mod memory;
/// SQLite backend.
pub mod sqlite;

use crate::{
    booking::Booking,
    engine::ranked_class::RankedClass,
    mutation::{MutationRecord, NewMutation},
    participant::{Participant, ParticipantDraft},
    types::{BookingNr, MutationId, ParticipantId, QueueKind, RoundId, Scope},
};

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// SQLite reported an error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A payload could not be (de)serialized.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// The referenced mutation does not exist.
    #[error("mutation {0} not found")]
    MissingMutation(MutationId),
    /// A record for another queue was handed to this log.
    #[error("{code} belongs to the {expected} queue, not {actual}")]
    WrongQueue {
        /// Offending code.
        code: String,
        /// Queue of this log.
        actual: QueueKind,
        /// Queue the code belongs to.
        expected: QueueKind,
    },
    /// Anything else, e.g. a corrupt row.
    #[error("{0}")]
    Message(String),
}

/// Result alias for storage calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Append-only mutation log for one queue.
pub trait MutationStore: Send + Sync {
    /// Queue this log holds.
    fn queue(&self) -> QueueKind;

    /// Appends a record and returns its id.
    fn enqueue(&self, new: NewMutation) -> PersistResult<MutationId>;

    /// Id of an unprocessed record carrying the same request, if any.
    fn find_pending(&self, new: &NewMutation) -> PersistResult<Option<MutationId>>;

    /// Appends unless an identical request is still pending.
    ///
    /// Returns the id and whether a new record was created.
    fn enqueue_unique(&self, new: NewMutation) -> PersistResult<(MutationId, bool)> {
        if let Some(id) = self.find_pending(&new)? {
            return Ok((id, false));
        }
        Ok((self.enqueue(new)?, true))
    }

    /// Fetches one record.
    fn get(&self, id: MutationId) -> PersistResult<Option<MutationRecord>>;

    /// Unprocessed records with `id > last_id`, ascending.
    fn fetch_unprocessed_since(&self, last_id: MutationId) -> PersistResult<Vec<MutationRecord>>;

    /// Flags a record as processed. Flagging twice is a no-op.
    fn mark_processed(&self, id: MutationId) -> PersistResult<()>;

    /// Total number of records in this log.
    fn count(&self) -> PersistResult<u64>;

    /// True once the consumer finished the record.
    fn is_processed(&self, id: MutationId) -> PersistResult<bool> {
        Ok(self.get(id)?.is_some_and(|r| r.is_processed))
    }
}

/// Participant tables and cut limits.
pub trait RankingRepository: Send + Sync {
    /// Adds a participant at the end of its class list with rank 0.
    fn register(&self, draft: ParticipantDraft) -> PersistResult<ParticipantId>;

    /// Fetches one participant.
    fn participant(&self, id: ParticipantId) -> PersistResult<Option<Participant>>;

    /// Loads a class list with its cut limit.
    fn load_class(&self, scope: Scope) -> PersistResult<RankedClass>;

    /// Writes back every participant and the cut limit of a class.
    fn save_class(&self, class: &RankedClass) -> PersistResult<()>;

    /// Classes that have participants in `round`, ascending.
    fn scopes_in_round(&self, round: RoundId) -> PersistResult<Vec<Scope>>;
}

/// Bookings and the booking number counter.
pub trait PaymentRepository: Send + Sync {
    /// Next booking number; incremented under an exclusive lock.
    fn next_booking_nr(&self) -> PersistResult<BookingNr>;

    /// Allocates a number and stores a new booking.
    fn create_booking(&self, amount_cents: u64) -> PersistResult<Booking>;

    /// Fetches a booking.
    fn booking(&self, nr: BookingNr) -> PersistResult<Option<Booking>>;

    /// Finds the booking a gateway payment belongs to.
    fn booking_by_payment(&self, payment_id: &str) -> PersistResult<Option<Booking>>;

    /// Overwrites a stored booking.
    fn save_booking(&self, booking: &Booking) -> PersistResult<()>;
}

pub(crate) fn check_queue(queue: QueueKind, new: &NewMutation) -> PersistResult<()> {
    match crate::mutation::MutationCode::parse(&new.code) {
        Some(code) if code.queue() != queue => Err(PersistError::WrongQueue {
            code: new.code.clone(),
            actual: queue,
            expected: code.queue(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

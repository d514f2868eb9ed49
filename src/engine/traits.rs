use tracing::info;

use crate::{
    booking::Booking,
    mutation::{Mutation, MutationError, MutationRecord},
    persist::PersistError,
    types::{BookingNr, Participation, ParticipantId, Scope},
};

use super::ranked_class::RankingError;

/// Whether a handler took care of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The handler applied the mutation.
    Done,
    /// The code is not this handler's; try the next one.
    NotMine,
}

/// Handler failures.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Storage failed; the record is retried later.
    #[error("storage: {0}")]
    Persist(#[from] PersistError),
    /// The stored record cannot be decoded.
    #[error(transparent)]
    Mutation(#[from] MutationError),
    /// A list operation was rejected.
    #[error(transparent)]
    Ranking(#[from] RankingError),
    /// The referenced participant does not exist.
    #[error("participant {0} not found")]
    MissingParticipant(ParticipantId),
    /// The referenced booking does not exist.
    #[error("booking {0} not found")]
    MissingBooking(BookingNr),
    /// The payment gateway refused the request.
    #[error("gateway: {0}")]
    Gateway(String),
}

impl HandlerError {
    /// Transient errors leave the record unprocessed for a later pass; all
    /// others skip it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persist(_))
    }
}

/// Applies decoded mutations. Handlers are tried in registration order.
pub trait MutationHandler: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Applies `mutation`, or returns [`Handled::NotMine`] for foreign codes.
    fn handle(
        &mut self,
        record: &MutationRecord,
        mutation: &Mutation,
    ) -> Result<Handled, HandlerError>;
}

/// Messages for the outside world (e-mail, task lists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A reserve moved into the qualifying group.
    ReservePromoted {
        /// Class list.
        scope: Scope,
        /// Promoted participant.
        participant: ParticipantId,
        /// Rank after promotion.
        rank: u32,
    },
    /// A participant's attendance changed.
    ParticipationChanged {
        /// Class list.
        scope: Scope,
        /// Affected participant.
        participant: ParticipantId,
        /// New state.
        participation: Participation,
    },
    /// A booking was paid.
    PaymentCompleted {
        /// Paid booking.
        booking: BookingNr,
    },
    /// A booking payment failed.
    PaymentFailed {
        /// Affected booking.
        booking: BookingNr,
        /// Gateway status.
        status: String,
    },
}

/// Receives [`Notification`]s.
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    fn notify(&self, notification: Notification);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        info!(?notification, "notification");
    }
}

/// Starts payments with the external provider.
pub trait PaymentGateway: Send + Sync {
    /// Asks the provider for a payment. The answer arrives later as a
    /// `CREATE_PAYMENT_RESPONSE` mutation.
    fn request_payment(&self, booking: &Booking) -> Result<(), String>;
}

/// Gateway that leaves the request to an outside process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGateway;

impl PaymentGateway for NullGateway {
    fn request_payment(&self, _booking: &Booking) -> Result<(), String> {
        Ok(())
    }
}

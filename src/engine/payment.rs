//! Handler for the payment queue.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    booking::{Booking, BookingStatus, GatewayStatus},
    mutation::{Mutation, MutationRecord},
    persist::PaymentRepository,
    types::BookingNr,
};

use super::traits::{
    Handled, HandlerError, MutationHandler, Notification, Notifier, PaymentGateway,
};

/// Applies `AFREKENEN`, `CREATE_PAYMENT_RESPONSE` and `PAYMENT_STATUS_CHANGED`.
pub struct PaymentHandler {
    repo: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl PaymentHandler {
    /// Creates a handler over `repo`.
    pub fn new(
        repo: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            gateway,
            notifier,
        }
    }

    fn booking(&self, nr: BookingNr) -> Result<Booking, HandlerError> {
        self.repo
            .booking(nr)?
            .ok_or(HandlerError::MissingBooking(nr))
    }

    fn checkout(&self, nr: BookingNr) -> Result<(), HandlerError> {
        let mut booking = self.booking(nr)?;
        if !matches!(booking.status, BookingStatus::New | BookingStatus::Failed) {
            info!(booking = nr, status = booking.status.as_str(), "checkout ignored");
            return Ok(());
        }

        booking.status = BookingStatus::PaymentRequested;
        self.repo.save_booking(&booking)?;
        if let Err(reason) = self.gateway.request_payment(&booking) {
            error!(booking = nr, %reason, "payment request failed");
            booking.status = BookingStatus::Failed;
            self.repo.save_booking(&booking)?;
            self.notifier.notify(Notification::PaymentFailed {
                booking: nr,
                status: reason,
            });
            return Ok(());
        }
        info!(booking = nr, amount_cents = booking.amount_cents, "payment requested");
        Ok(())
    }

    fn payment_created(
        &self,
        nr: BookingNr,
        payment_id: &str,
        checkout_url: Option<&str>,
        status: &str,
    ) -> Result<(), HandlerError> {
        let mut booking = self.booking(nr)?;
        if booking.status == BookingStatus::Paid {
            warn!(booking = nr, payment_id, "payment response for a paid booking ignored");
            return Ok(());
        }

        booking.payment_id = Some(payment_id.to_string());
        booking.checkout_url = checkout_url.map(str::to_string);
        booking.payment_status = Some(status.to_string());
        if GatewayStatus::parse(status) == GatewayStatus::Open {
            booking.status = BookingStatus::PaymentActive;
            info!(booking = nr, payment_id, "payment active");
        } else {
            booking.status = BookingStatus::Failed;
            warn!(booking = nr, payment_id, status, "payment could not be created");
        }
        self.repo.save_booking(&booking)?;
        Ok(())
    }

    fn status_changed(&self, payment_id: &str, status: &str) -> Result<(), HandlerError> {
        let Some(mut booking) = self.repo.booking_by_payment(payment_id)? else {
            warn!(payment_id, status, "status change for unknown payment");
            return Ok(());
        };
        let nr = booking.nr;
        booking.payment_status = Some(status.to_string());

        let gateway_status = GatewayStatus::parse(status);
        let notification = match gateway_status {
            GatewayStatus::Paid if booking.status != BookingStatus::Paid => {
                booking.status = BookingStatus::Paid;
                info!(booking = nr, payment_id, "booking paid");
                Some(Notification::PaymentCompleted { booking: nr })
            }
            ref failed if failed.is_failure() && booking.status != BookingStatus::Paid => {
                booking.status = BookingStatus::Failed;
                info!(booking = nr, payment_id, status, "payment failed");
                Some(Notification::PaymentFailed {
                    booking: nr,
                    status: status.to_string(),
                })
            }
            _ => None,
        };

        self.repo.save_booking(&booking)?;
        if let Some(notification) = notification {
            self.notifier.notify(notification);
        }
        Ok(())
    }
}

impl MutationHandler for PaymentHandler {
    fn name(&self) -> &'static str {
        "payment"
    }

    fn handle(
        &mut self,
        _record: &MutationRecord,
        mutation: &Mutation,
    ) -> Result<Handled, HandlerError> {
        match mutation {
            Mutation::Checkout { booking } => self.checkout(*booking)?,
            Mutation::CreatePaymentResponse {
                booking,
                payment_id,
                checkout_url,
                status,
            } => self.payment_created(*booking, payment_id, checkout_url.as_deref(), status)?,
            Mutation::PaymentStatusChanged { payment_id, status } => {
                self.status_changed(payment_id, status)?
            }
            _ => return Ok(Handled::NotMine),
        }
        Ok(Handled::Done)
    }
}

use hashbrown::HashMap;

use crate::{
    booking::Booking,
    types::BookingNr,
};

/// In-memory bookings and the booking number counter.
#[derive(Debug, Default)]
pub struct BookingLedger {
    bookings: HashMap<BookingNr, Booking>,
    highest_nr: BookingNr,
}

impl BookingLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next booking number.
    pub fn next_nr(&mut self) -> BookingNr {
        self.highest_nr += 1;
        self.highest_nr
    }

    /// Allocates a number and stores a new booking.
    pub fn create(&mut self, amount_cents: u64, created_ms: u64) -> Booking {
        let nr = self.next_nr();
        let booking = Booking::new(nr, amount_cents, created_ms);
        self.bookings.insert(nr, booking.clone());
        booking
    }

    /// Looks up a booking.
    pub fn get(&self, nr: BookingNr) -> Option<&Booking> {
        self.bookings.get(&nr)
    }

    /// Booking carrying `payment_id`.
    pub fn by_payment(&self, payment_id: &str) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.payment_id.as_deref() == Some(payment_id))
    }

    /// Replaces a stored booking.
    pub fn save(&mut self, booking: &Booking) {
        self.bookings.insert(booking.nr, booking.clone());
    }
}

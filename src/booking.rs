//! Bookings paid through the payment queue.

use serde::{Deserialize, Serialize};

use crate::types::BookingNr;

/// Booking payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Created, no payment started.
    #[default]
    New,
    /// Checkout processed; waiting for the gateway answer.
    PaymentRequested,
    /// Gateway created a payment that the buyer can complete.
    PaymentActive,
    /// Fully paid. Terminal.
    Paid,
    /// Payment failed, expired or was cancelled; checkout may be retried.
    Failed,
}

impl BookingStatus {
    /// Storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::PaymentRequested => "requested",
            Self::PaymentActive => "active",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    /// Parses a storage name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "new" => Some(Self::New),
            "requested" => Some(Self::PaymentRequested),
            "active" => Some(Self::PaymentActive),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Gateway-reported payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Created, buyer has not finished.
    Open,
    /// Buyer finished, settlement pending.
    Pending,
    /// Authorized, not yet captured.
    Authorized,
    /// Money received.
    Paid,
    /// Buyer cancelled.
    Canceled,
    /// Buyer did not finish in time.
    Expired,
    /// Gateway rejected the payment.
    Failed,
    /// Anything else the gateway may send.
    Other(String),
}

impl GatewayStatus {
    /// Parses the gateway's status string.
    pub fn parse(status: &str) -> Self {
        match status {
            "open" => Self::Open,
            "pending" => Self::Pending,
            "authorized" => Self::Authorized,
            "paid" => Self::Paid,
            "canceled" => Self::Canceled,
            "expired" => Self::Expired,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// True for statuses after which the payment can no longer complete.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Canceled | Self::Expired | Self::Failed)
    }
}

/// A booking with its payment state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Number from the shared counter.
    pub nr: BookingNr,
    /// Amount due in cents.
    pub amount_cents: u64,
    /// Payment lifecycle state.
    pub status: BookingStatus,
    /// Gateway payment id once known.
    pub payment_id: Option<String>,
    /// Where the buyer completes the payment.
    pub checkout_url: Option<String>,
    /// Last raw gateway status.
    pub payment_status: Option<String>,
    /// Creation time in milliseconds.
    pub created_ms: u64,
}

impl Booking {
    pub(crate) fn new(nr: BookingNr, amount_cents: u64, created_ms: u64) -> Self {
        Self {
            nr,
            amount_cents,
            status: BookingStatus::New,
            payment_id: None,
            checkout_url: None,
            payment_status: None,
            created_ms,
        }
    }
}

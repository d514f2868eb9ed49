//! Mutation model: the typed requests, their wire codes and the stored log record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BookingNr, MutationId, ParticipantId, QueueKind, RoundId, Scope};

/// Version number for serialized [`PayloadEnvelope`] payloads.
pub const PAYLOAD_FORMAT_VERSION: u16 = 1;

/// Wire codes understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationCode {
    /// `INITIEEL`: recompute ranks for every class of a round.
    Initial,
    /// `OPSTELLEN`: build the initial order of an imported class.
    Seed,
    /// `CUT`: change or delete a class cut limit.
    Cut,
    /// `AFMELDEN`: participant withdraws.
    Withdraw,
    /// `BEVESTIGEN`: participant confirms or re-registers.
    Confirm,
    /// `AFREKENEN`: start paying a booking.
    Checkout,
    /// `CREATE_PAYMENT_RESPONSE`: gateway answered a payment request.
    CreatePaymentResponse,
    /// `PAYMENT_STATUS_CHANGED`: gateway reported a new payment status.
    PaymentStatusChanged,
}

impl MutationCode {
    /// All codes, ranking queue first.
    pub const ALL: [MutationCode; 8] = [
        Self::Initial,
        Self::Seed,
        Self::Cut,
        Self::Withdraw,
        Self::Confirm,
        Self::Checkout,
        Self::CreatePaymentResponse,
        Self::PaymentStatusChanged,
    ];

    /// Code as stored in the log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIEEL",
            Self::Seed => "OPSTELLEN",
            Self::Cut => "CUT",
            Self::Withdraw => "AFMELDEN",
            Self::Confirm => "BEVESTIGEN",
            Self::Checkout => "AFREKENEN",
            Self::CreatePaymentResponse => "CREATE_PAYMENT_RESPONSE",
            Self::PaymentStatusChanged => "PAYMENT_STATUS_CHANGED",
        }
    }

    /// Looks up a stored code; `None` for codes this build does not know.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Queue that carries this code.
    pub fn queue(self) -> QueueKind {
        match self {
            Self::Initial | Self::Seed | Self::Cut | Self::Withdraw | Self::Confirm => {
                QueueKind::Ranking
            }
            Self::Checkout | Self::CreatePaymentResponse | Self::PaymentStatusChanged => {
                QueueKind::Payment
            }
        }
    }
}

/// Typed mutation request.
///
/// Serialized adjacently tagged so that the tag is the wire code and the content is
/// the stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "payload")]
pub enum Mutation {
    /// Recompute ranks from order for every class in the round.
    #[serde(rename = "INITIEEL")]
    Initial {
        /// Round to recompute.
        round: RoundId,
    },
    /// Build the order of a freshly imported class from averages.
    #[serde(rename = "OPSTELLEN")]
    Seed {
        /// Class to seed.
        scope: Scope,
    },
    /// Set (`Some`) or delete (`None`) the cut limit of a class.
    #[serde(rename = "CUT")]
    Cut {
        /// Class to change.
        scope: Scope,
        /// New limit; `None` removes it.
        new_limit: Option<u32>,
    },
    /// Participant withdraws.
    #[serde(rename = "AFMELDEN")]
    Withdraw {
        /// Withdrawing participant.
        participant: ParticipantId,
    },
    /// Participant confirms, or registers again after withdrawing.
    #[serde(rename = "BEVESTIGEN")]
    Confirm {
        /// Confirming participant.
        participant: ParticipantId,
    },
    /// Start the payment of a booking.
    #[serde(rename = "AFREKENEN")]
    Checkout {
        /// Booking to pay.
        booking: BookingNr,
    },
    /// Gateway answer to a payment request.
    #[serde(rename = "CREATE_PAYMENT_RESPONSE")]
    CreatePaymentResponse {
        /// Booking the request was made for.
        booking: BookingNr,
        /// Gateway payment id.
        payment_id: String,
        /// Where the buyer completes the payment.
        checkout_url: Option<String>,
        /// Gateway status at creation time.
        status: String,
    },
    /// Gateway reported a status change.
    #[serde(rename = "PAYMENT_STATUS_CHANGED")]
    PaymentStatusChanged {
        /// Gateway payment id.
        payment_id: String,
        /// New gateway status.
        status: String,
    },
}

/// Decoding failures for stored records.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// The code is not known to this build.
    #[error("unknown mutation code {0:?}")]
    UnknownCode(String),
    /// The code is known but the payload does not match it.
    #[error("bad payload for {code}: {source}")]
    BadPayload {
        /// Wire code.
        code: String,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// The stored payload bytes could not be read at all.
    #[error("unreadable payload for {code}: {reason}")]
    UnreadablePayload {
        /// Wire code.
        code: String,
        /// What the store reported.
        reason: String,
    },
}

impl Mutation {
    /// Wire code of this request.
    pub fn code(&self) -> MutationCode {
        match self {
            Self::Initial { .. } => MutationCode::Initial,
            Self::Seed { .. } => MutationCode::Seed,
            Self::Cut { .. } => MutationCode::Cut,
            Self::Withdraw { .. } => MutationCode::Withdraw,
            Self::Confirm { .. } => MutationCode::Confirm,
            Self::Checkout { .. } => MutationCode::Checkout,
            Self::CreatePaymentResponse { .. } => MutationCode::CreatePaymentResponse,
            Self::PaymentStatusChanged { .. } => MutationCode::PaymentStatusChanged,
        }
    }

    /// Human-readable reference to what this request affects.
    pub fn target_ref(&self) -> String {
        match self {
            Self::Initial { round } => format!("round:{round}"),
            Self::Seed { scope } | Self::Cut { scope, .. } => format!("class:{scope}"),
            Self::Withdraw { participant } | Self::Confirm { participant } => {
                format!("participant:{participant}")
            }
            Self::Checkout { booking } | Self::CreatePaymentResponse { booking, .. } => {
                format!("booking:{booking}")
            }
            Self::PaymentStatusChanged { payment_id, .. } => format!("payment:{payment_id}"),
        }
    }

    /// Splits the request into the parts the log stores.
    pub fn to_new(&self, requested_by: Option<String>) -> Result<NewMutation, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        let payload = tagged
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(NewMutation {
            code: self.code().as_str().to_string(),
            target_ref: self.target_ref(),
            payload,
            requested_by,
        })
    }

    /// Rebuilds the typed request from a stored record.
    pub fn decode(record: &MutationRecord) -> Result<Self, MutationError> {
        if MutationCode::parse(&record.code).is_none() {
            return Err(MutationError::UnknownCode(record.code.clone()));
        }
        if let Some(reason) = &record.payload_error {
            return Err(MutationError::UnreadablePayload {
                code: record.code.clone(),
                reason: reason.clone(),
            });
        }
        let tagged = serde_json::json!({
            "code": record.code,
            "payload": record.payload,
        });
        serde_json::from_value(tagged).map_err(|source| MutationError::BadPayload {
            code: record.code.clone(),
            source,
        })
    }
}

/// A request as handed to the store; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMutation {
    /// Wire code.
    pub code: String,
    /// Affected scope, for logs.
    pub target_ref: String,
    /// Code-specific data.
    pub payload: Value,
    /// Who asked for it.
    pub requested_by: Option<String>,
}

impl NewMutation {
    /// True when `record` carries the same request.
    pub fn same_request(&self, record: &MutationRecord) -> bool {
        self.code == record.code
            && self.target_ref == record.target_ref
            && self.payload == record.payload
    }
}

/// One row of the append-only mutation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Strictly increasing per queue; never reused.
    pub id: MutationId,
    /// Queue the record belongs to.
    pub queue: QueueKind,
    /// Wire code.
    pub code: String,
    /// Affected scope, for logs.
    pub target_ref: String,
    /// Code-specific data.
    pub payload: Value,
    /// Who asked for it.
    pub requested_by: Option<String>,
    /// Insert time in milliseconds.
    pub created_ms: u64,
    /// Set once by the consumer after the handler succeeded.
    pub is_processed: bool,
    /// Set when the stored payload could not be decoded; `payload` is then null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_error: Option<String>,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped payload.
    pub payload: Value,
}

impl PayloadEnvelope {
    /// Constructs an envelope using [`PAYLOAD_FORMAT_VERSION`].
    pub fn new(payload: Value) -> Self {
        Self {
            format_version: PAYLOAD_FORMAT_VERSION,
            payload,
        }
    }
}

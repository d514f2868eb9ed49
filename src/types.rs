//! Shared primitive IDs, scopes and ranking enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic mutation identifier, assigned by the store on insert.
pub type MutationId = u64;
/// Participant identifier.
pub type ParticipantId = u64;
/// Competition round identifier (one RK/BK round).
pub type RoundId = u64;
/// Competition class identifier within a round.
pub type ClassId = u64;
/// Booking number handed out by the shared counter.
pub type BookingNr = u64;

/// A ranked list lives in exactly one `(round, class)` scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    /// Round the list belongs to.
    pub round: RoundId,
    /// Class within the round.
    pub class: ClassId,
}

impl Scope {
    /// Builds a scope from its parts.
    pub fn new(round: RoundId, class: ClassId) -> Self {
        Self { round, class }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.round, self.class)
    }
}

/// Whether a participant takes part in the championship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Participation {
    /// Confirmed attendance.
    Yes,
    /// Withdrawn; never holds a rank.
    No,
    /// Not yet answered; still eligible.
    #[default]
    Unknown,
}

impl Participation {
    /// True for everyone that may hold a rank.
    pub fn is_eligible(self) -> bool {
        self != Self::No
    }

    /// Storage code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "J",
            Self::No => "N",
            Self::Unknown => "?",
        }
    }

    /// Parses a storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "J" => Some(Self::Yes),
            "N" => Some(Self::No),
            "?" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Score average with three decimals, stored as thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Average(u32);

impl Average {
    /// Builds an average from thousandths (`9_123` is `9.123`).
    pub const fn from_thousandths(value: u32) -> Self {
        Self(value)
    }

    /// Raw thousandths.
    pub const fn thousandths(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// The two mutation queues. Each one has its own log, wake-up channel and consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    /// Championship list maintenance.
    Ranking,
    /// Booking payments.
    Payment,
}

impl QueueKind {
    /// Storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ranking => "ranking",
            Self::Payment => "payment",
        }
    }

    /// Parses a storage name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ranking" => Some(Self::Ranking),
            "payment" => Some(Self::Payment),
            _ => None,
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Consumer event stream payloads.

use crate::types::MutationId;

/// Why a record was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The record was already processed when re-fetched.
    AlreadyProcessed,
    /// No handler knows the code.
    UnknownCode,
    /// The handler rejected the record permanently.
    Rejected,
}

/// Events emitted from the consumer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// A record was applied and marked processed.
    Processed {
        /// Record id.
        id: MutationId,
        /// Wire code.
        code: String,
    },
    /// A record was passed over.
    Skipped {
        /// Record id.
        id: MutationId,
        /// Why.
        reason: SkipReason,
    },
    /// A handler hit a transient error; the record waits for the next pass.
    Deferred {
        /// Record id.
        id: MutationId,
    },
    /// One polling pass finished.
    PassCompleted {
        /// Records applied in this pass.
        processed: usize,
        /// Highest id handled so far.
        high_water: MutationId,
    },
    /// The consumer left its loop.
    Stopped,
}

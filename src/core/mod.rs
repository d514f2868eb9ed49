//! In-memory tables backing [`crate::persist::memory`].

/// Helper index aliases.
pub mod indices;
/// Booking table and number counter.
pub mod ledger;
/// Append-only mutation log.
pub mod log;
/// Participant table and cut limits.
pub mod table;

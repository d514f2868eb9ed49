//! Mutation handlers and the ranked list algorithm.

/// Handler chain.
pub mod dispatch;
/// Payment queue handler.
pub mod payment;
/// Order/rank maintenance for one class list.
pub mod ranked_class;
/// Ranking queue handler.
pub mod ranking;
/// Handler, notifier and gateway traits.
pub mod traits;

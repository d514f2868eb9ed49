//! Producer, wake-up channel and consumer loop.

/// The single worker per queue.
pub mod consumer;
/// Consumer event stream payloads.
pub mod events;
/// Enqueue API with bounded backoff.
pub mod producer;
/// Coalescing ping channel.
pub mod wakeup;

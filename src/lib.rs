//! Mutation-queue driven maintenance of championship qualification lists.
//!
//! Request handlers never touch ranks directly. They append a mutation to a
//! queue and ping the consumer; a single consumer per queue applies the
//! mutations in order and keeps every class list consistent.
//!
//! # Examples
//!
//! The list algorithm on its own with [`engine::ranked_class::RankedClass`]:
//! ```
//! use ranklog::{
//!     engine::ranked_class::{RankedClass, WithdrawOutcome},
//!     participant::Participant,
//!     types::{Average, Participation, Scope},
//! };
//!
//! let scope = Scope::new(1, 1);
//! let entries = (1..=4u32)
//!     .map(|i| Participant {
//!         id: u64::from(i),
//!         scope,
//!         member_ref: format!("member-{i}"),
//!         rank: 0,
//!         order: i,
//!         average: Average::from_thousandths(10_000 - i * 100),
//!         participation: Participation::Yes,
//!         champion_label: String::new(),
//!     })
//!     .collect();
//!
//! let mut class = RankedClass::new(scope, Some(2), entries);
//! class.recompute_ranks();
//! let outcome = class.withdraw(1).expect("withdraw");
//! assert_eq!(
//!     outcome,
//!     WithdrawOutcome::Withdrawn { previous_rank: 1, promoted: Some(3) }
//! );
//! assert_eq!(class.get(3).map(|p| p.rank), Some(2));
//! ```
//!
//! Producer and consumer over the in-memory store:
//! ```no_run
//! use std::sync::Arc;
//!
//! use ranklog::{
//!     config::{ProducerConfig, WorkerConfig},
//!     engine::{dispatch::Dispatcher, ranking::RankingHandler, traits::LogNotifier},
//!     mutation::Mutation,
//!     persist::memory::MemoryStore,
//!     runtime::{
//!         consumer::{Consumer, ConsumerConfig},
//!         producer::Producer,
//!         wakeup::WakeUp,
//!     },
//!     types::{QueueKind, Scope},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let log = Arc::new(store.mutation_log(QueueKind::Ranking));
//! let wakeup = WakeUp::new(QueueKind::Ranking);
//! let dispatcher = Dispatcher::new()
//!     .with_handler(RankingHandler::new(Arc::new(store.clone()), Arc::new(LogNotifier)));
//! let config = ConsumerConfig::from_worker(&WorkerConfig::default(), 5, false);
//! let consumer = Consumer::new(log.clone(), dispatcher, wakeup.clone(), config).spawn();
//!
//! let producer = Producer::new(log, wakeup, ProducerConfig::default());
//! let cut = Mutation::Cut { scope: Scope::new(1, 1), new_limit: Some(8) };
//! producer.submit(cut, true).await.expect("submit");
//!
//! consumer.stop();
//! consumer.join().await.expect("consumer");
//! # }
//! ```
#![warn(missing_docs)]

/// Bookings paid through the payment queue.
pub mod booking;
/// Worker and producer configuration.
pub mod config;
/// In-memory tables.
pub mod core;
/// Mutation handlers and the ranked list algorithm.
pub mod engine;
/// Mutation model and stored records.
pub mod mutation;
/// Championship participants.
pub mod participant;
/// Storage traits with in-memory and SQLite backends.
pub mod persist;
/// Producer, wake-up channel and consumer loop.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;

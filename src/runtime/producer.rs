//! Enqueue API used by request handlers.

use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, warn};

use crate::{
    config::ProducerConfig,
    mutation::Mutation,
    persist::{MutationStore, PersistError},
    types::{MutationId, QueueKind},
};

use super::wakeup::WakeUp;

/// Errors from submitting a mutation. Waiting never fails.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The record could not be stored.
    #[error("enqueue failed: {0}")]
    Persist(#[from] PersistError),
    /// The payload could not be encoded.
    #[error("encoding payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// The mutation belongs to another queue.
    #[error("{code} belongs to the {expected} queue, not {actual}")]
    WrongQueue {
        /// Offending code.
        code: &'static str,
        /// Queue of this producer.
        actual: QueueKind,
        /// Queue the code belongs to.
        expected: QueueKind,
    },
}

/// Where a submitted mutation stands when the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Stored; the consumer has not finished it (yet).
    Accepted,
    /// The consumer applied it before the wait ran out.
    Processed,
}

/// Result of a submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// Record id.
    pub id: MutationId,
    /// False when an identical pending record was reused.
    pub created: bool,
    /// State at return.
    pub status: SubmitStatus,
}

/// Options for [`Producer::submit_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Poll with backoff until processed or the wait cap is reached.
    pub wait: bool,
    /// Reuse an identical pending record instead of appending.
    pub unique: bool,
    /// Who asked, stored with the record.
    pub requested_by: Option<String>,
}

/// Delays of the capped exponential backoff: 0.2s, 0.4s, 0.8s, 1.6s with the
/// default settings. Stops before the cumulative delay would exceed the cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    total: Duration,
    cap: Duration,
}

impl Backoff {
    /// Starts at `initial` and never sleeps more than `cap` in total.
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            next: initial,
            total: Duration::ZERO,
            cap,
        }
    }

    /// Backoff configured by `config`.
    pub fn from_config(config: &ProducerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_total_wait_ms),
        )
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.next.is_zero() || self.total + self.next > self.cap {
            return None;
        }
        let delay = self.next;
        self.total += delay;
        self.next = delay * 2;
        Some(delay)
    }
}

/// Appends mutations to one queue and pings its consumer.
#[derive(Clone)]
pub struct Producer {
    store: Arc<dyn MutationStore>,
    wakeup: WakeUp,
    config: ProducerConfig,
}

impl Producer {
    /// Creates a producer for the queue of `store`.
    pub fn new(store: Arc<dyn MutationStore>, wakeup: WakeUp, config: ProducerConfig) -> Self {
        Self {
            store,
            wakeup,
            config,
        }
    }

    /// Enqueues `mutation` and optionally waits for the consumer.
    pub async fn submit(&self, mutation: Mutation, wait: bool) -> Result<Submission, ProducerError> {
        self.submit_with(
            mutation,
            SubmitOptions {
                wait,
                ..SubmitOptions::default()
            },
        )
        .await
    }

    /// Enqueues `mutation` with explicit options.
    pub async fn submit_with(
        &self,
        mutation: Mutation,
        options: SubmitOptions,
    ) -> Result<Submission, ProducerError> {
        let (id, created) = self.enqueue(&mutation, &options)?;
        if !options.wait {
            return Ok(accepted(id, created));
        }

        // a reused record is awaited like a fresh one
        for delay in Backoff::from_config(&self.config) {
            if self.check_processed(id) {
                return Ok(processed(id, created));
            }
            tokio::time::sleep(delay).await;
        }
        Ok(self.final_state(id, created))
    }

    /// Blocking variant of [`Producer::submit`] for thread-based callers.
    ///
    /// Must not be called from inside an async task.
    pub fn submit_blocking(&self, mutation: Mutation, wait: bool) -> Result<Submission, ProducerError> {
        let options = SubmitOptions {
            wait,
            ..SubmitOptions::default()
        };
        let (id, created) = self.enqueue(&mutation, &options)?;
        if !wait {
            return Ok(accepted(id, created));
        }

        for delay in Backoff::from_config(&self.config) {
            if self.check_processed(id) {
                return Ok(processed(id, created));
            }
            std::thread::sleep(delay);
        }
        Ok(self.final_state(id, created))
    }

    fn enqueue(
        &self,
        mutation: &Mutation,
        options: &SubmitOptions,
    ) -> Result<(MutationId, bool), ProducerError> {
        let code = mutation.code();
        if code.queue() != self.store.queue() {
            return Err(ProducerError::WrongQueue {
                code: code.as_str(),
                actual: self.store.queue(),
                expected: code.queue(),
            });
        }

        let new = mutation.to_new(options.requested_by.clone())?;
        let (id, created) = if options.unique {
            self.store.enqueue_unique(new)?
        } else {
            (self.store.enqueue(new)?, true)
        };

        if created {
            self.wakeup.ping();
            debug!(mutation_id = id, code = code.as_str(), "mutation enqueued");
        } else {
            debug!(mutation_id = id, code = code.as_str(), "identical mutation still pending");
        }
        Ok((id, created))
    }

    fn check_processed(&self, id: MutationId) -> bool {
        match self.store.is_processed(id) {
            Ok(done) => done,
            Err(err) => {
                warn!(mutation_id = id, %err, "could not check mutation state");
                false
            }
        }
    }

    fn final_state(&self, id: MutationId, created: bool) -> Submission {
        if self.check_processed(id) {
            processed(id, created)
        } else {
            debug!(mutation_id = id, "consumer did not finish in time");
            accepted(id, created)
        }
    }
}

fn accepted(id: MutationId, created: bool) -> Submission {
    Submission {
        id,
        created,
        status: SubmitStatus::Accepted,
    }
}

fn processed(id: MutationId, created: bool) -> Submission {
    Submission {
        id,
        created,
        status: SubmitStatus::Processed,
    }
}

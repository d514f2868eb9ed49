//! The single worker that drains one mutation queue.
//!
//! The consumer alternates between waiting for a ping and polling the log.
//! Records are applied strictly in id order; a record is marked processed
//! only after its handler returned successfully. The loop runs until its
//! deadline, after which a scheduler is expected to start a fresh worker.

use std::sync::Arc;

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{UnknownCodePolicy, WorkerConfig},
    engine::dispatch::{Dispatch, Dispatcher},
    persist::{MutationStore, PersistError},
    types::MutationId,
};

use super::{
    events::{ConsumerEvent, SkipReason},
    wakeup::WakeUp,
};

/// Errors that end a run early.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// The log itself failed outside a handler.
    #[error("mutation log: {0}")]
    Persist(#[from] PersistError),
    /// A polling pass panicked or was cancelled.
    #[error("polling pass failed: {0}")]
    Join(String),
}

/// Consumer loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting for a ping, a tick or a change in record count.
    Waiting,
    /// Draining unprocessed records.
    Polling,
    /// Deadline reached or stop requested.
    Stopped,
}

/// Timing and policy for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Total active time, counted from [`Consumer::new`].
    pub run_time: Duration,
    /// Longest wait between passes without a ping.
    pub poll_interval: Duration,
    /// Stop instead of waiting once less than this remains.
    pub min_wait: Duration,
    /// Delay before the first pass.
    pub settle: Duration,
    /// Handling of unknown codes.
    pub unknown_code: UnknownCodePolicy,
}

impl ConsumerConfig {
    /// Settings for a run of `duration` minutes (seconds when `quick`).
    pub fn from_worker(worker: &WorkerConfig, duration: u64, quick: bool) -> Self {
        Self {
            run_time: worker.run_time(duration, quick),
            poll_interval: Duration::from_millis(worker.poll_interval_ms),
            min_wait: Duration::from_millis(worker.min_wait_ms),
            settle: worker.settle(quick),
            unknown_code: worker.unknown_code,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Polling passes executed.
    pub passes: u64,
    /// Records applied.
    pub processed: u64,
    /// Records passed over.
    pub skipped: u64,
    /// Pings that woke the consumer.
    pub pings: u64,
    /// Highest id handled.
    pub high_water: MutationId,
}

#[derive(Debug, Default)]
struct PassReport {
    processed: usize,
    skipped: usize,
    high_water: MutationId,
}

/// Drains one queue until its deadline.
pub struct Consumer {
    store: Arc<dyn MutationStore>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    wakeup: WakeUp,
    config: ConsumerConfig,
    deadline: Instant,
    events_tx: broadcast::Sender<ConsumerEvent>,
    cancel: CancellationToken,
    high_water: MutationId,
    seen_count: u64,
    report: RunReport,
}

/// Handle to a spawned [`Consumer`].
pub struct ConsumerHandle {
    events_tx: broadcast::Sender<ConsumerEvent>,
    cancel: CancellationToken,
    join: JoinHandle<Result<RunReport, ConsumerError>>,
}

impl ConsumerHandle {
    /// Subscribes to consumer events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.events_tx.subscribe()
    }

    /// Token that stops the consumer when cancelled.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Asks the consumer to stop after the current pass.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to end.
    pub async fn join(self) -> Result<RunReport, ConsumerError> {
        self.join
            .await
            .map_err(|e| ConsumerError::Join(e.to_string()))?
    }
}

impl Consumer {
    /// Creates a consumer; the deadline starts counting now.
    pub fn new(
        store: Arc<dyn MutationStore>,
        dispatcher: Dispatcher,
        wakeup: WakeUp,
        config: ConsumerConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        Self {
            store,
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            wakeup,
            deadline: Instant::now() + config.run_time,
            config,
            events_tx,
            cancel: CancellationToken::new(),
            high_water: 0,
            seen_count: 0,
            report: RunReport::default(),
        }
    }

    /// Subscribes to consumer events; call before [`Consumer::spawn`] to see every event.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.events_tx.subscribe()
    }

    /// Token that stops the consumer when cancelled.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the loop on a new task.
    pub fn spawn(self) -> ConsumerHandle {
        let events_tx = self.events_tx.clone();
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        ConsumerHandle {
            events_tx,
            cancel,
            join,
        }
    }

    /// Runs the loop until the deadline or a stop request.
    pub async fn run(mut self) -> Result<RunReport, ConsumerError> {
        info!(
            queue = %self.store.queue(),
            run_time_ms = self.config.run_time.as_millis() as u64,
            "consumer starting"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.config.settle) => {}
            _ = self.cancel.cancelled() => {}
        }

        let mut state = ConsumerState::Waiting;
        let result = loop {
            state = match state {
                ConsumerState::Waiting => match self.wait().await {
                    Ok(next) => next,
                    Err(err) => break Err(err),
                },
                ConsumerState::Polling => match self.poll().await {
                    Ok(()) => ConsumerState::Waiting,
                    Err(err) => break Err(err),
                },
                ConsumerState::Stopped => break Ok(self.report),
            };
        };

        match &result {
            Ok(report) => info!(
                passes = report.passes,
                processed = report.processed,
                skipped = report.skipped,
                pings = report.pings,
                "consumer stopped"
            ),
            Err(err) => error!(error = ?err, "consumer aborted"),
        }
        let _ = self.events_tx.send(ConsumerEvent::Stopped);
        result
    }

    async fn wait(&mut self) -> Result<ConsumerState, ConsumerError> {
        if self.cancel.is_cancelled() {
            return Ok(ConsumerState::Stopped);
        }
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("deadline reached");
            return Ok(ConsumerState::Stopped);
        }

        // new records are handled even when too little time is left to wait
        let count = self.store.count()?;
        if count != self.seen_count {
            self.seen_count = count;
            return Ok(ConsumerState::Polling);
        }
        if remaining <= self.config.min_wait {
            debug!(remaining_ms = remaining.as_millis() as u64, "no time left to wait");
            return Ok(ConsumerState::Stopped);
        }

        let timeout = self.config.poll_interval.min(remaining);
        tokio::select! {
            woke = self.wakeup.wait_for_ping(timeout) => {
                if woke {
                    self.report.pings += 1;
                }
                Ok(ConsumerState::Polling)
            }
            _ = self.cancel.cancelled() => Ok(ConsumerState::Stopped),
        }
    }

    async fn poll(&mut self) -> Result<(), ConsumerError> {
        let store = Arc::clone(&self.store);
        let dispatcher = Arc::clone(&self.dispatcher);
        let events_tx = self.events_tx.clone();
        let high_water = self.high_water;
        let deadline = self.deadline.into_std();
        let policy = self.config.unknown_code;

        let pass = tokio::task::spawn_blocking(move || {
            let mut dispatcher = dispatcher.blocking_lock();
            drain(
                store.as_ref(),
                &mut dispatcher,
                high_water,
                deadline,
                policy,
                &events_tx,
            )
        })
        .await
        .map_err(|e| ConsumerError::Join(e.to_string()))??;

        self.high_water = pass.high_water;
        self.report.passes += 1;
        self.report.processed += pass.processed as u64;
        self.report.skipped += pass.skipped as u64;
        self.report.high_water = pass.high_water;
        let _ = self.events_tx.send(ConsumerEvent::PassCompleted {
            processed: pass.processed,
            high_water: pass.high_water,
        });
        Ok(())
    }
}

fn drain(
    store: &dyn MutationStore,
    dispatcher: &mut Dispatcher,
    high_water: MutationId,
    deadline: std::time::Instant,
    policy: UnknownCodePolicy,
    events_tx: &broadcast::Sender<ConsumerEvent>,
) -> Result<PassReport, PersistError> {
    let ids: Vec<MutationId> = store
        .fetch_unprocessed_since(high_water)?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let mut pass = PassReport {
        high_water,
        ..PassReport::default()
    };
    let skip = |pass: &mut PassReport, id: MutationId, reason: SkipReason| {
        pass.skipped += 1;
        pass.high_water = id;
        let _ = events_tx.send(ConsumerEvent::Skipped { id, reason });
    };

    for id in ids {
        if std::time::Instant::now() >= deadline {
            debug!("deadline reached during pass");
            break;
        }

        // re-read: the row may have changed since the fetch
        let Some(record) = store.get(id)? else {
            warn!(mutation_id = id, "mutation disappeared");
            continue;
        };
        if record.is_processed {
            error!(mutation_id = id, code = %record.code, "mutation already processed");
            skip(&mut pass, id, SkipReason::AlreadyProcessed);
            continue;
        }

        debug!(mutation_id = id, code = %record.code, target = %record.target_ref, "applying mutation");
        match dispatcher.dispatch(&record) {
            Ok(Dispatch::Handled { handler }) => {
                store.mark_processed(id)?;
                pass.processed += 1;
                pass.high_water = id;
                info!(mutation_id = id, code = %record.code, handler, "mutation processed");
                let _ = events_tx.send(ConsumerEvent::Processed {
                    id,
                    code: record.code,
                });
            }
            Ok(Dispatch::Unknown) => {
                error!(mutation_id = id, code = %record.code, "unknown mutation code");
                if policy == UnknownCodePolicy::Skip {
                    store.mark_processed(id)?;
                }
                skip(&mut pass, id, SkipReason::UnknownCode);
            }
            Err(err) if err.is_transient() => {
                warn!(mutation_id = id, code = %record.code, error = %err, "mutation deferred");
                let _ = events_tx.send(ConsumerEvent::Deferred { id });
                break;
            }
            Err(err) => {
                error!(mutation_id = id, code = %record.code, error = %err, "mutation rejected");
                store.mark_processed(id)?;
                skip(&mut pass, id, SkipReason::Rejected);
            }
        }
    }

    Ok(pass)
}

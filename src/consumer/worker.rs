//! The per-consumer read/dispatch loop
//!
//! Each worker owns one consumer identity in the group and alternates
//! between a blocking group read and serial dispatch of whatever that read
//! returned. A worker never runs two handlers at once, so the number of
//! workers on a stream bounds the handlers in flight for it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::consumer::{dispatcher::Dispatcher, liveness::Liveness};
use crate::stream_log::{GroupReadOptions, StreamBatch, StreamLog};

/// Pause after a failed read before trying again
pub const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// The name one worker presents to the log within its group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerIdentity {
    prefix: String,
    index: usize,
}

impl ConsumerIdentity {
    pub fn new(prefix: impl Into<String>, index: usize) -> Self {
        Self {
            prefix: prefix.into(),
            index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Reading,
    Dispatching,
    Stopped,
}

/// State every worker of an engine shares
pub(crate) struct WorkerShared {
    pub(crate) log: Arc<dyn StreamLog>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) liveness: Liveness,
    pub(crate) group: String,
    pub(crate) read_count: usize,
    pub(crate) block_time: Duration,
}

/// What a single read produced
enum ReadOutcome {
    Batches(Vec<StreamBatch>),
    NoData,
    Failed,
}

pub(crate) struct WorkerLoop {
    stream: String,
    identity: ConsumerIdentity,
    options: GroupReadOptions,
    shared: Arc<WorkerShared>,
    shutdown: CancellationToken,
    state: WorkerState,
}

impl WorkerLoop {
    pub(crate) fn new(
        stream: impl Into<String>,
        identity: ConsumerIdentity,
        shared: Arc<WorkerShared>,
        shutdown: CancellationToken,
    ) -> Self {
        let stream = stream.into();
        let options = GroupReadOptions::new(&shared.group, identity.to_string(), &stream)
            .with_count(shared.read_count)
            .with_block(shared.block_time);

        Self {
            stream,
            identity,
            options,
            shared,
            shutdown,
            state: WorkerState::Reading,
        }
    }

    /// Run until the shutdown token is cancelled
    pub(crate) async fn run(mut self) {
        debug!(stream = %self.stream, consumer = %self.identity, "worker started");

        while self.state != WorkerState::Stopped {
            self.step().await;
        }

        info!(stream = %self.stream, consumer = %self.identity, "worker stopped");
    }

    async fn step(&mut self) {
        if self.shutdown.is_cancelled() {
            self.state = WorkerState::Stopped;
            return;
        }

        self.state = WorkerState::Reading;
        let batches = match self.read().await {
            ReadOutcome::Batches(batches) => batches,
            ReadOutcome::NoData => return,
            ReadOutcome::Failed => {
                self.backoff().await;
                return;
            }
        };

        self.shared.liveness.touch();

        self.state = WorkerState::Dispatching;
        for batch in batches {
            for entry in batch.entries {
                self.shared
                    .dispatcher
                    .dispatch(&self.shutdown, &self.stream, entry)
                    .await;
            }
        }
        self.state = WorkerState::Reading;
    }

    async fn read(&self) -> ReadOutcome {
        // Not raced against shutdown: the read returns within the block time
        match self.shared.log.read_group(&self.options).await {
            Ok(Some(batches)) if batches.iter().any(|b| !b.is_empty()) => {
                ReadOutcome::Batches(batches)
            }
            Ok(_) => {
                trace!(stream = %self.stream, consumer = %self.identity, "no new entries");
                ReadOutcome::NoData
            }
            Err(e) => {
                error!(
                    stream = %self.stream,
                    consumer = %self.identity,
                    error = %e,
                    "read error"
                );
                ReadOutcome::Failed
            }
        }
    }

    async fn backoff(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = time::sleep(READ_ERROR_BACKOFF) => {}
        }
    }
}

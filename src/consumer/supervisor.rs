use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::consumer::worker::{ConsumerIdentity, WorkerLoop, WorkerShared};

/// Fans one stream out to its pool of workers
pub(crate) struct StreamSupervisor {
    stream: String,
    consumer_prefix: String,
    concurrency: usize,
}

impl StreamSupervisor {
    pub(crate) fn new(
        stream: impl Into<String>,
        consumer_prefix: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            stream: stream.into(),
            consumer_prefix: consumer_prefix.into(),
            concurrency,
        }
    }

    /// The identities this supervisor's workers read under
    pub(crate) fn identities(&self) -> Vec<ConsumerIdentity> {
        (0..self.concurrency)
            .map(|index| ConsumerIdentity::new(&self.consumer_prefix, index))
            .collect()
    }

    /// Spawn every worker on `tracker`
    ///
    /// Spawning registers each task with the tracker before it first runs,
    /// so a concurrent shutdown wait cannot miss a late starter.
    pub(crate) fn launch(
        &self,
        tracker: &TaskTracker,
        shared: &Arc<WorkerShared>,
        shutdown: &CancellationToken,
    ) -> Vec<ConsumerIdentity> {
        let identities = self.identities();

        for identity in &identities {
            let worker = WorkerLoop::new(
                &self.stream,
                identity.clone(),
                Arc::clone(shared),
                shutdown.clone(),
            );
            tracker.spawn(worker.run());
        }

        info!(
            stream = %self.stream,
            workers = identities.len(),
            "stream consumers started"
        );

        identities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities_are_distinct_and_ordered() {
        let supervisor = StreamSupervisor::new("events", "c1", 3);
        let names: Vec<String> = supervisor
            .identities()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(names, vec!["c1-0", "c1-1", "c1-2"]);
    }
}

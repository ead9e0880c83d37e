//! In-process stream log
//!
//! Keeps streams, consumer groups and their pending entries in memory with
//! the same delivery rules as Redis Streams: a group read hands out entries
//! past the group's last-delivered id, records them as pending for the
//! reading consumer, and an ack removes them from the pending list. Nothing
//! survives the process.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::stream_log::{
    error::{Error, Result},
    service::{GroupReadOptions, StartPosition, StreamLog},
    types::{EntryId, StreamBatch, StreamEntry},
};

#[derive(Debug, Default)]
struct GroupState {
    last_delivered: EntryId,
    /// Pending entries and the consumer each was delivered to
    pending: BTreeMap<EntryId, String>,
}

#[derive(Debug, Default)]
struct StreamState {
    entries: Vec<StreamEntry>,
    last_id: EntryId,
    groups: HashMap<String, GroupState>,
}

#[derive(Debug, Default)]
struct Inner {
    streams: Mutex<HashMap<String, StreamState>>,
    appended: Notify,
}

/// In-memory implementation of [`StreamLog`]
///
/// Cloning is cheap and every clone shares the same streams.
#[derive(Debug, Clone, Default)]
pub struct MemoryStreamLog {
    inner: Arc<Inner>,
}

impl MemoryStreamLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn streams(&self) -> Result<MutexGuard<'_, HashMap<String, StreamState>>> {
        self.inner
            .streams
            .lock()
            .map_err(|_| Error::ConnectionError("stream state lock poisoned".to_string()))
    }

    /// Number of entries ever appended to a stream
    pub fn stream_len(&self, stream: &str) -> Result<usize> {
        Ok(self
            .streams()?
            .get(stream)
            .map(|s| s.entries.len())
            .unwrap_or(0))
    }

    /// Ids pending for one consumer of a group, in id order
    pub fn pending_for(&self, stream: &str, group: &str, consumer: &str) -> Result<Vec<EntryId>> {
        let streams = self.streams()?;
        let group_state = streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .ok_or_else(|| no_group(stream, group))?;

        Ok(group_state
            .pending
            .iter()
            .filter(|(_, owner)| owner.as_str() == consumer)
            .map(|(id, _)| *id)
            .collect())
    }

    /// Hand out up to `count` undelivered entries, or `None` if there are none yet
    fn try_deliver(&self, options: &GroupReadOptions) -> Result<Option<Vec<StreamEntry>>> {
        let mut streams = self.streams()?;
        let state = streams
            .get_mut(&options.stream)
            .ok_or_else(|| no_group(&options.stream, &options.group))?;
        let group = state
            .groups
            .get_mut(&options.group)
            .ok_or_else(|| no_group(&options.stream, &options.group))?;

        let delivered: Vec<StreamEntry> = state
            .entries
            .iter()
            .filter(|entry| entry.id > group.last_delivered)
            .take(options.count)
            .cloned()
            .collect();

        let Some(last) = delivered.last() else {
            return Ok(None);
        };

        group.last_delivered = last.id;
        for entry in &delivered {
            group.pending.insert(entry.id, options.consumer.clone());
        }

        Ok(Some(delivered))
    }
}

#[async_trait]
impl StreamLog for MemoryStreamLog {
    async fn create_group(&self, stream: &str, group: &str, start: StartPosition) -> Result<()> {
        let mut streams = self.streams()?;
        let state = streams.entry(stream.to_string()).or_default();

        if state.groups.contains_key(group) {
            return Err(Error::GroupExists(
                "Consumer Group name already exists".to_string(),
            ));
        }

        let last_delivered = match start {
            StartPosition::Tail => state.last_id,
            StartPosition::Beginning => EntryId::default(),
            StartPosition::After(id) => id,
        };

        state.groups.insert(
            group.to_string(),
            GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );

        Ok(())
    }

    async fn read_group(&self, options: &GroupReadOptions) -> Result<Option<Vec<StreamBatch>>> {
        let deadline = Instant::now() + options.block;

        loop {
            // Register for wakeups before looking, so an append landing
            // between the check and the wait is not missed
            let appended = self.inner.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if let Some(entries) = self.try_deliver(options)? {
                return Ok(Some(vec![StreamBatch::new(options.stream.clone(), entries)]));
            }

            if time::timeout_at(deadline, appended).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: EntryId) -> Result<u64> {
        let mut streams = self.streams()?;
        let removed = streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
            .and_then(|g| g.pending.remove(&id))
            .map(|_| 1)
            .unwrap_or(0);

        Ok(removed)
    }

    async fn append(&self, stream: &str, fields: &HashMap<String, String>) -> Result<EntryId> {
        if fields.is_empty() {
            return Err(Error::ValidationError(
                "An entry needs at least one field".to_string(),
            ));
        }

        let id = {
            let mut streams = self.streams()?;
            let state = streams.entry(stream.to_string()).or_default();

            let now = Utc::now().timestamp_millis().max(0) as u64;
            let id = if now > state.last_id.millis {
                EntryId::new(now, 0)
            } else {
                state.last_id.next()
            };

            state.last_id = id;
            state.entries.push(StreamEntry::new(id, fields.clone()));
            id
        };

        self.inner.appended.notify_waiters();

        Ok(id)
    }

    async fn pending_count(&self, stream: &str, group: &str) -> Result<u64> {
        let streams = self.streams()?;
        let group_state = streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .ok_or_else(|| no_group(stream, group))?;

        Ok(group_state.pending.len() as u64)
    }
}

fn no_group(stream: &str, group: &str) -> Error {
    Error::CommandError {
        code: "NOGROUP".to_string(),
        message: format!(
            "No such key '{}' or consumer group '{}' in XREADGROUP with GROUP option",
            stream, group
        ),
    }
}

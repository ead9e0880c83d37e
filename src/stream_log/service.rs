//! The log service interface the consumer engine is written against

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::stream_log::{
    error::Result,
    types::{EntryId, StreamBatch},
};

/// Where a newly created consumer group starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Only entries appended after the group is created (`$`)
    Tail,

    /// Every entry already in the stream (`0`)
    Beginning,

    /// Entries strictly after the given id
    After(EntryId),
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPosition::Tail => write!(f, "$"),
            StartPosition::Beginning => write!(f, "0"),
            StartPosition::After(id) => write!(f, "{}", id),
        }
    }
}

/// Options for a consumer-group read of never-delivered entries
#[derive(Debug, Clone)]
pub struct GroupReadOptions {
    /// Consumer group name
    pub group: String,

    /// Consumer identity within the group
    pub consumer: String,

    /// Stream to read from
    pub stream: String,

    /// Maximum entries to retrieve
    pub count: usize,

    /// How long to wait for new entries before reporting "no data"
    pub block: Duration,
}

impl GroupReadOptions {
    /// Create new group read options
    pub fn new(
        group: impl Into<String>,
        consumer: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            consumer: consumer.into(),
            stream: stream.into(),
            count: 10,
            block: Duration::from_secs(5),
        }
    }

    /// Set the read count (builder pattern)
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the block duration (builder pattern)
    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }
}

/// Append-only stream log with consumer groups
///
/// Implementations must be safe to share between every worker of an engine;
/// all methods take `&self` and may be called concurrently.
#[async_trait]
pub trait StreamLog: Send + Sync {
    /// Create a consumer group on a stream, creating the stream if absent
    ///
    /// Returns [`Error::GroupExists`](crate::stream_log::Error::GroupExists)
    /// when the group is already in place.
    async fn create_group(&self, stream: &str, group: &str, start: StartPosition) -> Result<()>;

    /// Read entries never delivered to any consumer of the group
    ///
    /// Blocks up to `options.block`. Returns `None` when nothing arrived in
    /// that window.
    async fn read_group(&self, options: &GroupReadOptions) -> Result<Option<Vec<StreamBatch>>>;

    /// Acknowledge an entry, returning how many entries were removed from
    /// the pending list (0 or 1)
    async fn ack(&self, stream: &str, group: &str, id: EntryId) -> Result<u64>;

    /// Append an entry, returning the id the log assigned to it
    async fn append(&self, stream: &str, fields: &HashMap<String, String>) -> Result<EntryId>;

    /// Number of entries delivered to the group but not yet acknowledged
    async fn pending_count(&self, stream: &str, group: &str) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position_display() {
        assert_eq!(StartPosition::Tail.to_string(), "$");
        assert_eq!(StartPosition::Beginning.to_string(), "0");
        assert_eq!(StartPosition::After(EntryId::new(10, 2)).to_string(), "10-2");
    }

    #[test]
    fn test_group_read_options_builder() {
        let options = GroupReadOptions::new("workers", "c1-0", "events")
            .with_count(50)
            .with_block(Duration::from_millis(250));

        assert_eq!(options.group, "workers");
        assert_eq!(options.consumer, "c1-0");
        assert_eq!(options.stream, "events");
        assert_eq!(options.count, 50);
        assert_eq!(options.block, Duration::from_millis(250));
    }
}

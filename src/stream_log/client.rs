use async_trait::async_trait;
use deadpool_redis::redis::{
    self,
    streams::{StreamPendingReply, StreamReadReply},
};
use deadpool_redis::Pool;
use std::collections::HashMap;

use crate::stream_log::{
    connection::RedisConfig,
    error::{Error, Result},
    service::{GroupReadOptions, StartPosition, StreamLog},
    types::{EntryId, StreamBatch, StreamEntry},
};

/// Redis Streams implementation of [`StreamLog`]
///
/// Every call checks a connection out of the pool, so a worker parked in a
/// blocking `XREADGROUP` never holds up another worker's commands.
#[derive(Clone)]
pub struct RedisStreamLog {
    pool: Pool,
}

impl RedisStreamLog {
    /// Create a new client from configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use redstream::stream_log::{RedisConfig, RedisStreamLog};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = RedisConfig::from_url("redis://:redis123@localhost:6380/0")?;
    ///     let log = RedisStreamLog::new(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = config.build_pool()?;
        let log = Self { pool };

        // Test the connection
        log.ping().await?;

        Ok(log)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Round-trip a PING to the server
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl StreamLog for RedisStreamLog {
    async fn create_group(&self, stream: &str, group: &str, start: StartPosition) -> Result<()> {
        let mut conn = self.pool.get().await?;

        let _: () = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg(start.to_string())
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn read_group(&self, options: &GroupReadOptions) -> Result<Option<Vec<StreamBatch>>> {
        let mut conn = self.pool.get().await?;

        // BLOCK 0 would wait forever
        let block_ms = options.block.as_millis().max(1) as u64;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&options.group)
            .arg(&options.consumer)
            .arg("COUNT")
            .arg(options.count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&options.stream)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let Some(reply) = reply else {
            return Ok(None);
        };

        let mut batches = Vec::with_capacity(reply.keys.len());
        for key in reply.keys {
            let mut entries = Vec::with_capacity(key.ids.len());
            for stream_id in key.ids {
                entries.push(to_entry(&stream_id.id, stream_id.map)?);
            }
            batches.push(StreamBatch::new(key.key, entries));
        }

        if batches.iter().all(StreamBatch::is_empty) {
            return Ok(None);
        }

        Ok(Some(batches))
    }

    async fn ack(&self, stream: &str, group: &str, id: EntryId) -> Result<u64> {
        let mut conn = self.pool.get().await?;

        let removed: u64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await?;

        Ok(removed)
    }

    async fn append(&self, stream: &str, fields: &HashMap<String, String>) -> Result<EntryId> {
        if fields.is_empty() {
            return Err(Error::ValidationError(
                "An entry needs at least one field".to_string(),
            ));
        }

        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (name, value) in fields {
            cmd.arg(name).arg(value);
        }

        let mut conn = self.pool.get().await?;
        let id: String = cmd.query_async(&mut conn).await?;

        id.parse()
    }

    async fn pending_count(&self, stream: &str, group: &str) -> Result<u64> {
        let mut conn = self.pool.get().await?;

        let reply: StreamPendingReply = redis::cmd("XPENDING")
            .arg(stream)
            .arg(group)
            .query_async(&mut conn)
            .await?;

        Ok(reply.count() as u64)
    }
}

/// Convert a raw stream id/field map into a [`StreamEntry`]
fn to_entry(id: &str, map: HashMap<String, redis::Value>) -> Result<StreamEntry> {
    let id = id.parse::<EntryId>()?;

    let mut fields = HashMap::with_capacity(map.len());
    for (name, value) in map {
        let value: String = redis::from_redis_value(&value).map_err(|e| {
            Error::ProtocolError(format!("Field {:?} of entry {} is not a string: {}", name, id, e))
        })?;
        fields.insert(name, value);
    }

    Ok(StreamEntry::new(id, fields))
}

//! Engine configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::consumer::{error::ConfigError, tracer::Tracer};
use crate::stream_log::RedisConfig;

/// Entries requested per read when unset
pub const DEFAULT_READ_COUNT: usize = 10;

/// Read block duration when unset
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(5);

/// Workers per stream when unset
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Consumer name prefix when unset
pub const DEFAULT_CONSUMER_NAME: &str = "consumer";

/// Configuration for a consumer engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where the log service lives
    pub redis: RedisConfig,

    /// Streams to consume
    pub streams: Vec<String>,

    /// Consumer group name, shared by every worker
    pub group: String,

    /// Prefix of each worker's consumer identity
    pub consumer_name: String,

    /// Maximum entries per read
    pub read_count: usize,

    /// How long a read waits for new entries
    pub block_time: Duration,

    /// Workers per stream
    pub concurrency: usize,

    /// Acknowledge entries whose handler succeeded
    pub ack_on_success: bool,

    /// Address of the `/healthz` listener, if any
    pub health_addr: Option<SocketAddr>,

    /// Span factory for handler invocations
    #[serde(skip)]
    pub tracer: Tracer,
}

impl EngineConfig {
    /// Create a new engine configuration
    ///
    /// # Example
    ///
    /// ```
    /// use redstream::consumer::EngineConfig;
    /// use std::time::Duration;
    ///
    /// let config = EngineConfig::new(["events", "logs"], "workers")
    ///     .with_consumer_name("c1")
    ///     .with_concurrency(4)
    ///     .with_read_count(50)
    ///     .with_block_time(Duration::from_secs(2))
    ///     .with_ack_on_success(true);
    /// ```
    pub fn new<I, S>(streams: I, group: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            redis: RedisConfig::default(),
            streams: streams.into_iter().map(Into::into).collect(),
            group: group.into(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
            read_count: DEFAULT_READ_COUNT,
            block_time: DEFAULT_BLOCK_TIME,
            concurrency: DEFAULT_CONCURRENCY,
            ack_on_success: false,
            health_addr: None,
            tracer: Tracer::default(),
        }
    }

    /// Set the connection target (builder pattern)
    pub fn with_redis(mut self, redis: RedisConfig) -> Self {
        self.redis = redis;
        self
    }

    /// Set the consumer name prefix (builder pattern)
    pub fn with_consumer_name(mut self, consumer_name: impl Into<String>) -> Self {
        self.consumer_name = consumer_name.into();
        self
    }

    /// Set the read count (builder pattern)
    pub fn with_read_count(mut self, read_count: usize) -> Self {
        self.read_count = read_count;
        self
    }

    /// Set the block duration (builder pattern)
    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    /// Set the workers per stream (builder pattern)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable or disable acknowledge-on-success (builder pattern)
    pub fn with_ack_on_success(mut self, ack_on_success: bool) -> Self {
        self.ack_on_success = ack_on_success;
        self
    }

    /// Serve `/healthz` on this address (builder pattern)
    pub fn with_health_addr(mut self, addr: SocketAddr) -> Self {
        self.health_addr = Some(addr);
        self
    }

    /// Set the tracer (builder pattern)
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// Total workers across all streams
    pub fn total_workers(&self) -> usize {
        self.streams.len() * self.concurrency.max(1)
    }

    /// Validate and fill in defaults
    ///
    /// Blank and duplicate stream names are dropped; a stream listed twice
    /// would otherwise get two workers with the same identity.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        let mut streams: Vec<String> = Vec::with_capacity(self.streams.len());
        for stream in self.streams.drain(..) {
            let stream = stream.trim().to_string();
            if !stream.is_empty() && !streams.contains(&stream) {
                streams.push(stream);
            }
        }
        if streams.is_empty() {
            return Err(ConfigError::NoStreams);
        }
        self.streams = streams;

        if self.group.trim().is_empty() {
            return Err(ConfigError::EmptyGroup);
        }

        if self.consumer_name.trim().is_empty() {
            self.consumer_name = DEFAULT_CONSUMER_NAME.to_string();
        }
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
        if self.read_count == 0 {
            self.read_count = DEFAULT_READ_COUNT;
        }
        if self.block_time.is_zero() {
            self.block_time = DEFAULT_BLOCK_TIME;
        }

        Ok(self)
    }
}

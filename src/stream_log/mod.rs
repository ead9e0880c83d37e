//! Stream log client library
//!
//! Append-only streams with consumer groups, behind the [`StreamLog`] trait.
//! Two implementations are provided: [`RedisStreamLog`] talks to Redis
//! Streams through a connection pool, and [`MemoryStreamLog`] keeps
//! everything in process.
//!
//! # Quick Start
//!
//! ```no_run
//! use redstream::stream_log::{RedisConfig, RedisStreamLog, StartPosition, StreamLog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::from_url("redis://localhost:6379/0")?;
//!     let log = RedisStreamLog::new(config).await?;
//!
//!     match log.create_group("events", "workers", StartPosition::Tail).await {
//!         Ok(()) => {}
//!         Err(e) if e.is_group_exists() => {}
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod memory;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use client::RedisStreamLog;
pub use connection::RedisConfig;
pub use error::{Error, Result};
pub use memory::MemoryStreamLog;
pub use service::{GroupReadOptions, StartPosition, StreamLog};
pub use types::{EntryId, StreamBatch, StreamEntry};

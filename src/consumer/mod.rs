//! Consumer engine for stream consumer groups
//!
//! This module provides:
//! - `Engine`: Starts, supervises and stops the workers for a set of streams
//! - `EngineConfig`: Configuration for an engine
//! - `Liveness`: Read-activity health signal
//!
//! # Consumer Pattern
//!
//! Each configured stream gets `concurrency` workers. Every worker:
//!
//! 1. **Read**: Blocking group read of new entries under its own consumer identity
//! 2. **Track**: Marks the engine live after any non-empty read
//! 3. **Dispatch**: Runs the handler for each entry, one at a time, in read order
//! 4. **Acknowledge**: Acks entries whose handler succeeded, if enabled
//! 5. **Repeat**: Until the engine is stopped
//!
//! Failed handlers leave their entries pending in the group. Read errors are
//! logged and retried after a one second pause, forever.
//!
//! # Example
//!
//! ```no_run
//! use redstream::consumer::{handler_fn, Engine, EngineConfig};
//! use redstream::stream_log::MemoryStreamLog;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = Arc::new(MemoryStreamLog::new());
//!     let config = EngineConfig::new(["events"], "workers")
//!         .with_concurrency(4)
//!         .with_ack_on_success(true);
//!
//!     let handler = handler_fn(|_ctx, stream, entry| async move {
//!         println!("Stream={} ID={} Data={:?}", stream, entry.id, entry.fields);
//!         Ok(())
//!     });
//!
//!     let engine = Engine::new(config, log, handler)?;
//!     engine.start().await?;
//!     // ...
//!     engine.stop(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod liveness;
pub mod tracer;
pub mod worker;

mod dispatcher;
mod supervisor;

pub use config::EngineConfig;
pub use engine::{Engine, EngineState};
pub use error::{ConfigError, EngineError, HealthError};
pub use handler::{handler_fn, Handler, HandlerContext, HandlerError, HandlerResult};
pub use liveness::{Liveness, LivenessStatus};
pub use tracer::Tracer;
pub use worker::ConsumerIdentity;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::consumer::{
    config::EngineConfig,
    dispatcher::Dispatcher,
    error::{ConfigError, EngineError, HealthError},
    handler::Handler,
    liveness::Liveness,
    supervisor::StreamSupervisor,
    worker::WorkerShared,
};
use crate::routes;
use crate::stream_log::{RedisStreamLog, StartPosition, StreamLog};

/// Lifecycle of an [`Engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

struct Lifecycle {
    state: EngineState,
    shutdown: Option<CancellationToken>,
}

/// Consumer-group engine over one or more streams
///
/// Single use: once stopped, an engine cannot be started again.
///
/// # Example
///
/// ```no_run
/// use redstream::consumer::{handler_fn, Engine, EngineConfig};
/// use redstream::stream_log::RedisConfig;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = EngineConfig::new(["events"], "workers")
///         .with_redis(RedisConfig::from_url("redis://localhost:6379/0")?)
///         .with_consumer_name("c1")
///         .with_concurrency(2)
///         .with_ack_on_success(true);
///
///     let handler = handler_fn(|_ctx, stream, entry| async move {
///         println!("{} {} {:?}", stream, entry.id, entry.fields);
///         Ok(())
///     });
///
///     let engine = Engine::connect(config, handler).await?;
///     engine.start().await?;
///
///     tokio::signal::ctrl_c().await?;
///     engine.stop(Duration::from_secs(5)).await?;
///     Ok(())
/// }
/// ```
pub struct Engine {
    config: EngineConfig,
    log: Arc<dyn StreamLog>,
    handler: Handler,
    liveness: Liveness,
    parent: CancellationToken,
    tracker: TaskTracker,
    lifecycle: Mutex<Lifecycle>,
}

impl Engine {
    /// Create an engine over an existing log handle
    pub fn new(
        config: EngineConfig,
        log: Arc<dyn StreamLog>,
        handler: Handler,
    ) -> Result<Self, ConfigError> {
        let config = config.normalized()?;

        Ok(Self {
            config,
            log,
            handler,
            liveness: Liveness::new(),
            parent: CancellationToken::new(),
            tracker: TaskTracker::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: EngineState::NotStarted,
                shutdown: None,
            }),
        })
    }

    /// Connect to Redis as described by `config.redis` and create an engine
    ///
    /// The pool is grown so every worker can hold a connection through its
    /// blocking read.
    pub async fn connect(config: EngineConfig, handler: Handler) -> Result<Self, EngineError> {
        let config = config.normalized()?;

        let mut redis = config.redis.clone();
        redis.max_pool_size = redis.max_pool_size.max(config.total_workers() + 2);

        info!(addr = %redis.address(), db = redis.db, "connecting to redis");
        let log = RedisStreamLog::new(redis).await?;

        Ok(Self::new(config, Arc::new(log), handler)?)
    }

    /// Derive the engine's cancellation from `parent` (builder pattern)
    ///
    /// Cancelling `parent` stops every worker, just as `stop` would, though
    /// only `stop` waits for them.
    pub fn with_parent_token(mut self, parent: CancellationToken) -> Self {
        self.parent = parent;
        self
    }

    /// The normalized configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle to the shared liveness tracker
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub async fn state(&self) -> EngineState {
        self.lifecycle.lock().await.state
    }

    /// Background tasks still running (workers and health listener)
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// `Err(Stale)` if no batch was read in the last 30 seconds
    pub fn health(&self) -> Result<(), HealthError> {
        self.liveness.check()
    }

    /// Bootstrap consumer groups and launch every worker
    ///
    /// Returns once the workers are spawned; reading happens in the
    /// background.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state != EngineState::NotStarted {
            return Err(EngineError::AlreadyStarted);
        }
        lifecycle.state = EngineState::Running;

        let shutdown = self.parent.child_token();
        lifecycle.shutdown = Some(shutdown.clone());

        self.bootstrap_groups().await;

        if let Some(addr) = self.config.health_addr {
            self.tracker.spawn(routes::serve_health(
                addr,
                self.liveness.clone(),
                shutdown.clone(),
            ));
        }

        let shared = Arc::new(WorkerShared {
            log: Arc::clone(&self.log),
            dispatcher: Dispatcher::new(
                Arc::clone(&self.log),
                Arc::clone(&self.handler),
                &self.config.group,
                self.config.ack_on_success,
                self.config.tracer.clone(),
            ),
            liveness: self.liveness.clone(),
            group: self.config.group.clone(),
            read_count: self.config.read_count,
            block_time: self.config.block_time,
        });

        for stream in &self.config.streams {
            StreamSupervisor::new(stream, &self.config.consumer_name, self.config.concurrency)
                .launch(&self.tracker, &shared, &shutdown);
        }

        info!(
            streams = ?self.config.streams,
            group = %self.config.group,
            workers = self.config.total_workers(),
            "consumer started"
        );

        Ok(())
    }

    /// Create each stream's group at the tail; failures do not stop startup
    async fn bootstrap_groups(&self) {
        for stream in &self.config.streams {
            match self
                .log
                .create_group(stream, &self.config.group, StartPosition::Tail)
                .await
            {
                Ok(()) => {
                    info!(stream = %stream, group = %self.config.group, "consumer group created");
                }
                Err(e) if e.is_group_exists() => {
                    debug!(stream = %stream, group = %self.config.group, "consumer group exists");
                }
                Err(e) => {
                    error!(stream = %stream, group = %self.config.group, error = %e, "group create error");
                }
            }
        }
    }

    /// Cancel every worker and wait up to `timeout` for all of them to exit
    ///
    /// A no-op on an engine that was never started. On
    /// [`EngineError::DeadlineExceeded`] the workers keep winding down and
    /// `stop` may be called again to wait for them.
    pub async fn stop(&self, timeout: Duration) -> Result<(), EngineError> {
        {
            let mut lifecycle = self.lifecycle.lock().await;
            match lifecycle.state {
                EngineState::NotStarted | EngineState::Stopped => return Ok(()),
                EngineState::Running | EngineState::Stopping => {}
            }
            lifecycle.state = EngineState::Stopping;

            if let Some(shutdown) = &lifecycle.shutdown {
                shutdown.cancel();
            }
            self.tracker.close();
        }

        // Waits without holding the lifecycle lock
        match time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                self.lifecycle.lock().await.state = EngineState::Stopped;
                info!("consumer stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "consumer stop deadline exceeded"
                );
                Err(EngineError::DeadlineExceeded(timeout))
            }
        }
    }
}

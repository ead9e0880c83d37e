#![allow(dead_code)]

use async_trait::async_trait;
use redstream::consumer::{handler_fn, Handler, HandlerError};
use redstream::stream_log::{
    EntryId, Error, GroupReadOptions, MemoryStreamLog, Result, StartPosition, StreamBatch,
    StreamLog,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testcontainers::{core::WaitFor, GenericImage, RunnableImage};

/// The Redis Docker image to use for testing
pub const REDIS_IMAGE: &str = "redis";
pub const REDIS_TAG: &str = "7-alpine";

/// Default Redis port
pub const REDIS_PORT: u16 = 6379;

/// Create a runnable Redis container
pub fn create_redis_container() -> RunnableImage<GenericImage> {
    let image = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    RunnableImage::from(image).with_tag(REDIS_TAG)
}

/// Create a runnable Redis container that requires `password`
pub fn create_redis_container_with_password(password: &str) -> RunnableImage<GenericImage> {
    let image = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    let args = vec![
        "redis-server".to_string(),
        "--requirepass".to_string(),
        password.to_string(),
    ];

    RunnableImage::from((image, args)).with_tag(REDIS_TAG)
}

/// Build a connection url for the running Redis container
pub fn build_connection_url(host: &str, port: u16) -> String {
    format!("redis://{}:{}/0", host, port)
}

/// A single-field entry payload
pub fn fields(name: &str, value: impl ToString) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    fields.insert(name.to_string(), value.to_string());
    fields
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// [`MemoryStreamLog`] with call counters and switchable failures
#[derive(Default)]
pub struct FaultyLog {
    pub inner: MemoryStreamLog,
    pub reads: AtomicUsize,
    pub acks: AtomicUsize,
    /// Number of upcoming reads that fail before reaching the inner log
    pub failing_reads: AtomicUsize,
    pub fail_acks: AtomicBool,
    pub fail_group_create: AtomicBool,
}

impl FaultyLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamLog for FaultyLog {
    async fn create_group(&self, stream: &str, group: &str, start: StartPosition) -> Result<()> {
        if self.fail_group_create.load(Ordering::SeqCst) {
            return Err(Error::ConnectionError("connection refused".to_string()));
        }
        self.inner.create_group(stream, group, start).await
    }

    async fn read_group(&self, options: &GroupReadOptions) -> Result<Option<Vec<StreamBatch>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::ConnectionError("connection reset".to_string()));
        }

        self.inner.read_group(options).await
    }

    async fn ack(&self, stream: &str, group: &str, id: EntryId) -> Result<u64> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(Error::ConnectionError("connection reset".to_string()));
        }
        self.inner.ack(stream, group, id).await
    }

    async fn append(&self, stream: &str, fields: &HashMap<String, String>) -> Result<EntryId> {
        self.inner.append(stream, fields).await
    }

    async fn pending_count(&self, stream: &str, group: &str) -> Result<u64> {
        self.inner.pending_count(stream, group).await
    }
}

/// What a [`Recorder`] saw
#[derive(Default)]
pub struct Recorded {
    pub deliveries: Vec<(String, EntryId)>,
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub completed: usize,
}

/// Handler that records every delivery and how many ran at once
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<Recorded>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(String, EntryId)> {
        self.state.lock().unwrap().deliveries.clone()
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.deliveries().into_iter().map(|(_, id)| id).collect()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().deliveries.len()
    }

    pub fn completed(&self) -> usize {
        self.state.lock().unwrap().completed
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Handler that records, waits `delay`, then fails entries with `fail=1`
    /// and panics on entries with `panic=1`
    pub fn handler(&self, delay: Duration) -> Handler {
        let recorder = self.clone();
        handler_fn(move |_ctx, stream, entry| {
            let recorder = recorder.clone();
            async move {
                recorder.enter(&stream, entry.id);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                recorder.exit();

                if entry.field("panic") == Some("1") {
                    panic!("cannot handle entry {}", entry.id);
                }
                if entry.field("fail") == Some("1") {
                    return Err(HandlerError::from(format!("refusing entry {}", entry.id)));
                }
                Ok(())
            }
        })
    }

    /// Handler that records, then awaits `wait` before succeeding
    pub fn gated_handler<F, Fut>(&self, wait: F) -> Handler
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let recorder = self.clone();
        let wait = Arc::new(wait);
        handler_fn(move |_ctx, stream, entry| {
            let recorder = recorder.clone();
            let wait = Arc::clone(&wait);
            async move {
                recorder.enter(&stream, entry.id);
                wait().await;
                recorder.exit();
                Ok(())
            }
        })
    }

    fn enter(&self, stream: &str, id: EntryId) {
        let mut state = self.state.lock().unwrap();
        state.deliveries.push((stream.to_string(), id));
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
    }

    fn exit(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        state.completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_connection_url() {
        let url = build_connection_url("localhost", 6380);
        assert_eq!(url, "redis://localhost:6380/0");
    }
}

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::stream_log::StreamEntry;

/// Error a handler reports for an entry it could not process
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one handler invocation
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Type alias for entry handler functions
///
/// Handlers receive the delivery context, the stream name and the entry.
/// They may be invoked concurrently from several workers.
pub type Handler =
    Arc<dyn Fn(HandlerContext, String, StreamEntry) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Per-delivery context handed to a handler
#[derive(Debug, Clone)]
pub struct HandlerContext {
    span: Span,
    shutdown: CancellationToken,
}

impl HandlerContext {
    pub(crate) fn new(span: Span, shutdown: CancellationToken) -> Self {
        Self { span, shutdown }
    }

    /// The span this delivery runs in
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Cancelled once the engine begins stopping
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Build a [`Handler`] from an async closure
///
/// # Example
///
/// ```
/// use redstream::consumer::handler_fn;
///
/// let handler = handler_fn(|_ctx, stream, entry| async move {
///     println!("{} {} {:?}", stream, entry.id, entry.fields);
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(HandlerContext, String, StreamEntry) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx, stream, entry| Box::pin(f(ctx, stream, entry)))
}

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument};

use crate::consumer::{
    handler::{Handler, HandlerContext},
    tracer::Tracer,
};
use crate::stream_log::{StreamEntry, StreamLog};

/// What happened to one delivered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Handler succeeded and the entry was acknowledged
    Acked,
    /// Handler succeeded; acknowledging is disabled
    Handled,
    /// Handler failed; the entry stays pending
    HandlerFailed,
    /// Handler panicked; treated like a failure
    HandlerPanicked,
    /// Handler succeeded but the acknowledge call failed
    AckFailed,
}

/// Runs the handler for one entry and acknowledges it on success
pub(crate) struct Dispatcher {
    log: Arc<dyn StreamLog>,
    handler: Handler,
    group: String,
    ack_on_success: bool,
    tracer: Tracer,
}

impl Dispatcher {
    pub(crate) fn new(
        log: Arc<dyn StreamLog>,
        handler: Handler,
        group: impl Into<String>,
        ack_on_success: bool,
        tracer: Tracer,
    ) -> Self {
        Self {
            log,
            handler,
            group: group.into(),
            ack_on_success,
            tracer,
        }
    }

    /// Deliver one entry
    ///
    /// Failures are logged here and never returned; a failed entry is left
    /// unacknowledged for the log's pending-entries mechanism.
    pub(crate) async fn dispatch(
        &self,
        shutdown: &CancellationToken,
        stream: &str,
        entry: StreamEntry,
    ) -> DispatchOutcome {
        let span = self.tracer.entry_span(stream, &entry.id);
        let context = HandlerContext::new(span.clone(), shutdown.clone());

        self.deliver(context, stream, entry).instrument(span).await
    }

    async fn deliver(
        &self,
        context: HandlerContext,
        stream: &str,
        entry: StreamEntry,
    ) -> DispatchOutcome {
        let id = entry.id;

        // The call sits inside the future so a panic while building it is caught too
        let handled = AssertUnwindSafe(async {
            (self.handler)(context, stream.to_string(), entry).await
        })
        .catch_unwind()
        .await;

        match handled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(stream = %stream, entry_id = %id, error = %e, "handler error");
                return DispatchOutcome::HandlerFailed;
            }
            Err(panic) => {
                error!(
                    stream = %stream,
                    entry_id = %id,
                    panic = %panic_message(panic.as_ref()),
                    "handler panicked"
                );
                return DispatchOutcome::HandlerPanicked;
            }
        }

        if !self.ack_on_success {
            return DispatchOutcome::Handled;
        }

        match self.log.ack(stream, &self.group, id).await {
            Ok(removed) => {
                debug!(stream = %stream, entry_id = %id, removed, "acknowledged");
                DispatchOutcome::Acked
            }
            Err(e) => {
                error!(stream = %stream, entry_id = %id, error = %e, "ack error");
                DispatchOutcome::AckFailed
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

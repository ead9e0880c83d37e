use std::fmt;
use tracing::Span;

use crate::stream_log::EntryId;

/// Instrumentation scope name used when none is configured
pub const DEFAULT_TRACER_NAME: &str = "redstream";

/// Name of the span opened around every handler invocation
pub const PROCESS_ENTRY_SPAN: &str = "process_entry";

/// Creates the spans the dispatcher wraps handler calls in
///
/// Spans go to whatever `tracing` subscriber the process installed; the
/// tracer name is recorded on every span so several engines in one process
/// can be told apart.
#[derive(Clone, PartialEq, Eq)]
pub struct Tracer {
    name: String,
}

impl Tracer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open a span for one entry delivery
    ///
    /// The span closes when the last handle to it is dropped.
    pub fn entry_span(&self, stream: &str, entry_id: &EntryId) -> Span {
        tracing::info_span!(
            PROCESS_ENTRY_SPAN,
            tracer = %self.name,
            stream = %stream,
            entry_id = %entry_id,
        )
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACER_NAME)
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracer").field(&self.name).finish()
    }
}

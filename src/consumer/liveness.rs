//! Read-activity liveness tracking
//!
//! A single timestamp of the last non-empty batch read, shared by every
//! worker. It reflects read activity only: a handler that fails every entry
//! still keeps the engine healthy as long as batches keep arriving, and a
//! stall on one stream is masked by activity on another.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::consumer::error::HealthError;

/// How long after the last successful read the engine turns stale
pub const STALE_AFTER: Duration = Duration::from_secs(30);

/// Result of a freshness query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessStatus {
    Healthy,
    Stale { since: DateTime<Utc> },
}

impl LivenessStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, LivenessStatus::Healthy)
    }
}

/// Shared last-read timestamp
#[derive(Debug, Clone)]
pub struct Liveness {
    last_read: Arc<RwLock<DateTime<Utc>>>,
}

impl Liveness {
    /// Start tracking; the creation time counts as the first read
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub(crate) fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            last_read: Arc::new(RwLock::new(at)),
        }
    }

    /// Record a successful read now
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    pub(crate) fn touch_at(&self, at: DateTime<Utc>) {
        // A poisoned lock still holds a valid timestamp
        let mut last_read = self.last_read.write().unwrap_or_else(PoisonError::into_inner);
        *last_read = at;
    }

    /// Healthy if a read succeeded within [`STALE_AFTER`]
    pub fn query(&self) -> LivenessStatus {
        self.query_at(Utc::now())
    }

    pub(crate) fn query_at(&self, now: DateTime<Utc>) -> LivenessStatus {
        let last_read = *self.last_read.read().unwrap_or_else(PoisonError::into_inner);

        let elapsed = (now - last_read).to_std().unwrap_or(Duration::ZERO);
        if elapsed > STALE_AFTER {
            LivenessStatus::Stale { since: last_read }
        } else {
            LivenessStatus::Healthy
        }
    }

    /// [`query`](Self::query) as a `Result`, for callers that report errors
    pub fn check(&self) -> Result<(), HealthError> {
        match self.query() {
            LivenessStatus::Healthy => Ok(()),
            LivenessStatus::Stale { since } => Err(HealthError::Stale { since }),
        }
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

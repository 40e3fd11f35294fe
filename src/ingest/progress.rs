//! Progress snapshots and the synchronous event channel the orchestrator emits on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Throughput and completion summary recomputed after every batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
    pub percentage: f64,
    pub elapsed_ms: u64,
    pub estimated_remaining_ms: u64,
    pub trades_per_second: f64,
}

impl ProgressSnapshot {
    /// Derive a snapshot from the counters and wall time since the run began.
    pub fn new(processed: u64, total: u64, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let trades_per_second = if elapsed_secs > 0.0 {
            processed as f64 / elapsed_secs
        } else {
            0.0
        };

        let remaining = total.saturating_sub(processed);
        let estimated_remaining_ms = if trades_per_second > 0.0 {
            (remaining as f64 / trades_per_second * 1000.0).round() as u64
        } else {
            0
        };

        let percentage = if total > 0 {
            processed as f64 / total as f64 * 100.0
        } else {
            100.0
        };

        Self {
            processed,
            total,
            percentage,
            elapsed_ms: elapsed.as_millis() as u64,
            estimated_remaining_ms,
            trades_per_second,
        }
    }

    /// Final snapshot: always 100% with nothing remaining.
    pub fn completed(processed: u64, total: u64, elapsed: Duration) -> Self {
        Self {
            percentage: 100.0,
            estimated_remaining_ms: 0,
            ..Self::new(processed, total, elapsed)
        }
    }
}

/// Lifecycle and progress notifications for one run.
///
/// Every run emits zero or more `Progress` events followed by exactly one of
/// `Complete`, `Error` or `Stopped`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum IngestEvent {
    Progress(ProgressSnapshot),
    Complete(ProgressSnapshot),
    Error(String),
    Stopped,
}

impl IngestEvent {
    pub fn name(&self) -> &'static str {
        match self {
            IngestEvent::Progress(_) => "progress",
            IngestEvent::Complete(_) => "complete",
            IngestEvent::Error(_) => "error",
            IngestEvent::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, IngestEvent::Progress(_))
    }
}

/// Observer registered on a `ProgressChannel`.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &IngestEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&IngestEvent) + Send + Sync,
{
    fn on_event(&self, event: &IngestEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener registry with synchronous, registration-ordered delivery.
///
/// No queueing or replay: a listener only sees events emitted while it is
/// subscribed.
#[derive(Default)]
pub struct ProgressChannel {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn ProgressListener>)>>,
    next_id: AtomicU64,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: ProgressListener + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Deliver to every current listener before returning.
    pub fn emit(&self, event: &IngestEvent) {
        // Snapshot first so listeners may (un)subscribe from inside a callback
        let listeners: Vec<Arc<dyn ProgressListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener.on_event(event);
        }
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ProgressListener for LoggingListener {
    fn on_event(&self, event: &IngestEvent) {
        match event {
            IngestEvent::Progress(p) => debug!(
                processed = p.processed,
                total = p.total,
                percentage = %format!("{:.1}", p.percentage),
                trades_per_second = p.trades_per_second as u64,
                eta_ms = p.estimated_remaining_ms,
                "Ingestion progress"
            ),
            IngestEvent::Complete(p) => info!(
                processed = p.processed,
                elapsed_ms = p.elapsed_ms,
                trades_per_second = p.trades_per_second as u64,
                "Ingestion complete"
            ),
            IngestEvent::Error(message) => error!(error = %message, "Ingestion failed"),
            IngestEvent::Stopped => warn!("Ingestion stopped"),
        }
    }
}

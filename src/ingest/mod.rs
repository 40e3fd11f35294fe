//! Ingestion runs: the orchestrator loop and its progress/event channel.

mod orchestrator;
mod progress;

pub use orchestrator::{
    IngestError, IngestionOrchestrator, RunState, RunStatus, RunSummary, StopHandle,
};
pub use progress::{
    IngestEvent, LoggingListener, ProgressChannel, ProgressListener, ProgressSnapshot,
    SubscriptionId,
};

//! Ingestion orchestrator: drives the generate -> write loop for one run at a time.
//!
//! Handles:
//! - Mutual exclusion of runs via `RunState`
//! - Cooperative cancellation checked at batch boundaries
//! - Progress and lifecycle notifications through a `ProgressChannel`
//! - Propagating sink failures both to the caller and as an `Error` event

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::generator::TradeGenerator;
use crate::models::ValidationError;
use crate::sink::{SinkWriter, WriteError};

use super::{IngestEvent, ProgressChannel, ProgressListener, ProgressSnapshot, SubscriptionId};

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
            RunState::Error => "error",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,

    #[error("no ingestion run is active")]
    NotRunning,

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("generated an invalid trade: {0}")]
    Validation(#[from] ValidationError),
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub state: RunState,
    pub run_id: Option<Uuid>,
    pub processed: u64,
    pub total: u64,
    pub last_error: Option<String>,
}

/// Outcome of a run that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    pub processed: u64,
    pub total: u64,
    pub elapsed_ms: u64,
}

/// Cloneable handle that requests cancellation of whatever run is active.
#[derive(Clone)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    /// Idempotent; a no-op when nothing is running.
    pub fn stop(&self) {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cancel();
    }
}

#[derive(Debug)]
struct RunTracker {
    state: RunState,
    run_id: Option<Uuid>,
    processed: u64,
    started_at: Option<Instant>,
    last_error: Option<String>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            run_id: None,
            processed: 0,
            started_at: None,
            last_error: None,
        }
    }
}

/// Streams generated batches into a sink, one run at a time.
pub struct IngestionOrchestrator<W: SinkWriter, R: Rng = StdRng> {
    generator: tokio::sync::Mutex<TradeGenerator<R>>,
    writer: tokio::sync::Mutex<W>,
    total: u64,
    batch_size: usize,
    tracker: Mutex<RunTracker>,
    cancel: Arc<Mutex<CancellationToken>>,
    channel: ProgressChannel,
}

impl<W, R> IngestionOrchestrator<W, R>
where
    W: SinkWriter,
    R: Rng + Send,
{
    pub fn new(generator: TradeGenerator<R>, writer: W) -> Self {
        let total = generator.total_target();
        let batch_size = generator.recommended_batch_size();

        Self {
            generator: tokio::sync::Mutex::new(generator),
            writer: tokio::sync::Mutex::new(writer),
            total,
            batch_size,
            tracker: Mutex::new(RunTracker::default()),
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            channel: ProgressChannel::new(),
        }
    }

    /// Total trades a run writes.
    pub fn total_target(&self) -> u64 {
        self.total
    }

    pub fn recommended_batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: ProgressListener + 'static,
    {
        self.channel.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(id)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: Arc::clone(&self.cancel),
        }
    }

    /// Request cancellation. Observed before the next batch starts.
    pub fn stop(&self) {
        if self.tracker().state == RunState::Running {
            info!("Stop requested");
        }
        self.stop_handle().stop();
    }

    pub fn status(&self) -> RunStatus {
        let tracker = self.tracker();
        RunStatus {
            state: tracker.state,
            run_id: tracker.run_id,
            processed: tracker.processed,
            total: self.total,
            last_error: tracker.last_error.clone(),
        }
    }

    /// Live progress of the active run.
    pub fn current_progress(&self) -> Result<ProgressSnapshot, IngestError> {
        let tracker = self.tracker();
        match (tracker.state, tracker.started_at) {
            (RunState::Running, Some(started_at)) => Ok(ProgressSnapshot::new(
                tracker.processed,
                self.total,
                started_at.elapsed(),
            )),
            _ => Err(IngestError::NotRunning),
        }
    }

    /// Run until the target is written, a stop is requested, or the sink fails.
    pub async fn start(&self) -> Result<RunSummary, IngestError> {
        self.start_with_id(Uuid::new_v4()).await
    }

    /// Same as `start`, under a caller-chosen run id (e.g. one already in a ledger).
    pub async fn start_with_id(&self, run_id: Uuid) -> Result<RunSummary, IngestError> {
        let cancel = self.begin_run(run_id)?;
        let mut guard = RunGuard {
            tracker: &self.tracker,
            channel: &self.channel,
            cancel: cancel.clone(),
            run_id,
            armed: true,
        };
        let started_at = Instant::now();

        info!(
            run_id = %run_id,
            total = self.total,
            batch_size = self.batch_size,
            "Starting ingestion run"
        );

        // Held until the terminal event is out, so a queued run's events follow it
        let mut generator = self.generator.lock().await;
        let mut writer = self.writer.lock().await;

        let result = self
            .run_batches(&mut generator, &mut writer, &cancel, started_at)
            .await;
        let elapsed = started_at.elapsed();
        guard.armed = false;

        match result {
            Ok(processed) => {
                let state = if cancel.is_cancelled() {
                    RunState::Stopped
                } else {
                    RunState::Completed
                };
                self.finish_run(state, None);

                info!(
                    run_id = %run_id,
                    processed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    state = %state,
                    "Ingestion run finished"
                );

                let event = match state {
                    RunState::Stopped => IngestEvent::Stopped,
                    _ => {
                        let snapshot = ProgressSnapshot::completed(processed, self.total, elapsed);
                        IngestEvent::Complete(snapshot)
                    }
                };
                self.channel.emit(&event);

                Ok(RunSummary {
                    run_id,
                    state,
                    processed,
                    total: self.total,
                    elapsed_ms: elapsed.as_millis() as u64,
                })
            }
            Err(err) => {
                let message = err.to_string();
                self.finish_run(RunState::Error, Some(message.clone()));

                error!(run_id = %run_id, error = %message, "Ingestion run failed");
                self.channel.emit(&IngestEvent::Error(message));

                Err(err)
            }
        }
    }

    /// Close the sink writer. Call once, after the last run.
    pub async fn close(&self) -> Result<(), WriteError> {
        let mut writer = self.writer.lock().await;
        writer.close().await
    }

    /// The loop itself. Returns the number of trades written.
    async fn run_batches(
        &self,
        generator: &mut TradeGenerator<R>,
        writer: &mut W,
        cancel: &CancellationToken,
        started_at: Instant,
    ) -> Result<u64, IngestError> {
        let mut processed: u64 = 0;

        while processed < self.total && !cancel.is_cancelled() {
            let batch_size = (self.batch_size as u64).min(self.total - processed) as usize;

            let trades = generator.generate_batch(batch_size)?;
            writer.write_batch(&trades).await?;

            processed += batch_size as u64;
            self.tracker().processed = processed;

            let snapshot = ProgressSnapshot::new(processed, self.total, started_at.elapsed());
            debug!(processed, total = self.total, batch_size, "Batch written");
            self.channel.emit(&IngestEvent::Progress(snapshot));
        }

        Ok(processed)
    }

    /// Claim the Running state and install a fresh cancellation token.
    fn begin_run(&self, run_id: Uuid) -> Result<CancellationToken, IngestError> {
        let mut tracker = self.tracker();
        if tracker.state == RunState::Running {
            warn!(run_id = ?tracker.run_id, "Start rejected: run already in progress");
            return Err(IngestError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token.clone();

        *tracker = RunTracker {
            state: RunState::Running,
            run_id: Some(run_id),
            processed: 0,
            started_at: Some(Instant::now()),
            last_error: None,
        };

        Ok(token)
    }

    fn finish_run(&self, state: RunState, error: Option<String>) {
        let mut tracker = self.tracker();
        tracker.state = state;
        tracker.last_error = error;
    }

    fn tracker(&self) -> MutexGuard<'_, RunTracker> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Settles a run whose `start` future was dropped before it finished.
struct RunGuard<'a> {
    tracker: &'a Mutex<RunTracker>,
    channel: &'a ProgressChannel,
    cancel: CancellationToken,
    run_id: Uuid,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        self.cancel.cancel();
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state = RunState::Stopped;

        warn!(run_id = %self.run_id, "Ingestion run abandoned before finishing");
        self.channel.emit(&IngestEvent::Stopped);
    }
}

impl RunSummary {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Average throughput over the whole run.
    pub fn trades_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{utc_midnight, GeneratorConfig};
    use crate::models::Trade;
    use crate::sink::MemorySink;
    use futures::future::{BoxFuture, FutureExt};
    use tokio::sync::Notify;

    fn generator(total: u64, batch_size: usize) -> TradeGenerator {
        let config = GeneratorConfig {
            symbols: vec!["AAPL".into(), "MSFT".into()],
            total_trades: total,
            batch_size,
            start_date: utc_midnight(2024, 1, 1),
            end_date: utc_midnight(2024, 1, 31),
        };
        TradeGenerator::with_seed(config, 21).unwrap()
    }

    /// Records batch sizes; optionally fails on a given (1-based) batch.
    #[derive(Default)]
    struct ScriptedSink {
        batches: Arc<Mutex<Vec<usize>>>,
        fail_on: Option<(usize, WriteError)>,
        calls: usize,
    }

    impl SinkWriter for ScriptedSink {
        fn write_batch<'a>(
            &'a mut self,
            trades: &'a [Trade],
        ) -> BoxFuture<'a, Result<(), WriteError>> {
            async move {
                self.calls += 1;
                if let Some((n, err)) = &self.fail_on {
                    if *n == self.calls {
                        return Err(err.clone());
                    }
                }
                self.batches.lock().unwrap().push(trades.len());
                Ok(())
            }
            .boxed()
        }

        fn close(&mut self) -> BoxFuture<'_, Result<(), WriteError>> {
            async { Ok(()) }.boxed()
        }
    }

    /// Blocks every write until released.
    struct GatedSink {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl SinkWriter for GatedSink {
        fn write_batch<'a>(
            &'a mut self,
            _trades: &'a [Trade],
        ) -> BoxFuture<'a, Result<(), WriteError>> {
            async move {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(())
            }
            .boxed()
        }

        fn close(&mut self) -> BoxFuture<'_, Result<(), WriteError>> {
            async { Ok(()) }.boxed()
        }
    }

    fn record_events<W: SinkWriter>(
        orchestrator: &IngestionOrchestrator<W>,
    ) -> Arc<Mutex<Vec<IngestEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        orchestrator.subscribe(move |event: &IngestEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        events
    }

    fn count(events: &[IngestEvent], name: &str) -> usize {
        events.iter().filter(|e| e.name() == name).count()
    }

    #[tokio::test]
    async fn test_even_batches_complete() {
        let sink = ScriptedSink::default();
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(100, 10), sink);
        let events = record_events(&orchestrator);

        let summary = orchestrator.start().await.unwrap();

        assert_eq!(*batches.lock().unwrap(), vec![10; 10]);
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.processed, 100);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 11);
        assert_eq!(count(&events, "progress"), 10);
        match events.last() {
            Some(IngestEvent::Complete(snapshot)) => {
                assert_eq!(snapshot.processed, 100);
                assert_eq!(snapshot.percentage, 100.0);
                assert_eq!(snapshot.estimated_remaining_ms, 0);
            }
            other => panic!("expected complete, got {:?}", other),
        }

        // Progress counts climb monotonically
        let processed: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                IngestEvent::Progress(p) => Some(p.processed),
                _ => None,
            })
            .collect();
        assert_eq!(processed, (1..=10).map(|i| i * 10).collect::<Vec<u64>>());
        assert_eq!(orchestrator.status().state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_final_batch_is_clipped() {
        let sink = ScriptedSink::default();
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(7, 10), sink);
        let events = record_events(&orchestrator);

        orchestrator.start().await.unwrap();

        assert_eq!(*batches.lock().unwrap(), vec![7]);
        let events = events.lock().unwrap();
        assert_eq!(count(&events, "progress"), 1);
        assert_eq!(events.last().map(|e| e.name()), Some("complete"));
    }

    #[tokio::test]
    async fn test_uneven_total_clips_last_batch() {
        let sink = ScriptedSink::default();
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(25, 10), sink);

        orchestrator.start().await.unwrap();
        assert_eq!(*batches.lock().unwrap(), vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_zero_total_completes_immediately() {
        let sink = ScriptedSink::default();
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(0, 10), sink);
        let events = record_events(&orchestrator);

        let summary = orchestrator.start().await.unwrap();

        assert!(batches.lock().unwrap().is_empty());
        assert_eq!(summary.processed, 0);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            IngestEvent::Complete(snapshot) => {
                assert_eq!(snapshot.processed, 0);
                assert_eq!(snapshot.percentage, 100.0);
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_after_first_batch() {
        let sink = ScriptedSink::default();
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(1_000, 10), sink);
        let events = record_events(&orchestrator);

        let handle = orchestrator.stop_handle();
        orchestrator.subscribe(move |event: &IngestEvent| {
            if matches!(event, IngestEvent::Progress(_)) {
                // Repeated stops are harmless
                handle.stop();
                handle.stop();
            }
        });

        let summary = orchestrator.start().await.unwrap();

        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.processed, 10);
        assert_eq!(*batches.lock().unwrap(), vec![10]);

        let events = events.lock().unwrap();
        assert_eq!(count(&events, "stopped"), 1);
        assert_eq!(count(&events, "complete"), 0);
        assert_eq!(events.last(), Some(&IngestEvent::Stopped));

        let status = orchestrator.status();
        assert_eq!(status.state, RunState::Stopped);
        assert_eq!(status.processed, 10);
    }

    #[tokio::test]
    async fn test_write_failure_aborts_run() {
        let injected = WriteError::Rejected {
            status: 400,
            body: "partial write: field type conflict".into(),
        };
        let sink = ScriptedSink {
            fail_on: Some((3, injected.clone())),
            ..ScriptedSink::default()
        };
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(100, 10), sink);
        let events = record_events(&orchestrator);

        let err = orchestrator.start().await.unwrap_err();

        assert_eq!(err, IngestError::Write(injected.clone()));
        assert_eq!(*batches.lock().unwrap(), vec![10, 10]);

        let status = orchestrator.status();
        assert_eq!(status.state, RunState::Error);
        assert_eq!(status.processed, 20);
        assert_eq!(status.last_error.as_deref(), Some(injected.to_string().as_str()));

        let events = events.lock().unwrap();
        assert_eq!(count(&events, "progress"), 2);
        assert_eq!(count(&events, "error"), 1);
        assert_eq!(count(&events, "complete"), 0);
        assert_eq!(events.last(), Some(&IngestEvent::Error(err.to_string())));
    }

    #[tokio::test]
    async fn test_start_while_running_is_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sink = GatedSink {
            entered: entered.clone(),
            release: release.clone(),
        };
        let orchestrator = Arc::new(IngestionOrchestrator::new(generator(20, 10), sink));

        let runner = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start().await })
        };

        entered.notified().await;
        let first_run = orchestrator.status().run_id;

        assert_eq!(orchestrator.start().await.unwrap_err(), IngestError::AlreadyRunning);

        let status = orchestrator.status();
        assert_eq!(status.state, RunState::Running);
        assert_eq!(status.run_id, first_run);
        assert_eq!(status.processed, 0);
        assert_eq!(orchestrator.current_progress().unwrap().processed, 0);

        release.notify_one();
        entered.notified().await;
        assert_eq!(orchestrator.status().processed, 10);
        release.notify_one();

        let summary = runner.await.unwrap().unwrap();
        assert_eq!(summary.processed, 20);
        assert_eq!(Some(summary.run_id), first_run);
    }

    #[tokio::test]
    async fn test_abandoned_run_releases_state() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sink = GatedSink {
            entered: entered.clone(),
            release: release.clone(),
        };
        let orchestrator = Arc::new(IngestionOrchestrator::new(generator(20, 10), sink));
        let events = record_events(orchestrator.as_ref());

        // The first write never completes, so the timeout drops the run mid-batch
        let abandoned = tokio::time::timeout(Duration::from_millis(50), orchestrator.start()).await;
        assert!(abandoned.is_err());

        let status = orchestrator.status();
        assert_eq!(status.state, RunState::Stopped);
        assert_eq!(status.processed, 0);
        assert_eq!(orchestrator.current_progress().unwrap_err(), IngestError::NotRunning);
        assert_eq!(events.lock().unwrap().last(), Some(&IngestEvent::Stopped));

        let runner = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start().await })
        };
        for _ in 0..2 {
            entered.notified().await;
            release.notify_one();
        }

        let summary = runner.await.unwrap().unwrap();
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.processed, 20);
        assert_eq!(count(&events.lock().unwrap(), "stopped"), 1);
        assert_eq!(count(&events.lock().unwrap(), "complete"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_next_run_events_follow_terminal_event() {
        let orchestrator = Arc::new(IngestionOrchestrator::new(
            generator(20, 10),
            MemorySink::new(),
        ));

        // Starts a second run from the first run's Complete callback, then lingers
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<()>();
        let ready_tx = Mutex::new(Some(ready_tx));
        orchestrator.subscribe(move |event: &IngestEvent| {
            if let IngestEvent::Complete(_) = event {
                if let Some(tx) = ready_tx.lock().unwrap().take() {
                    let _ = tx.send(());
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        });
        let events = record_events(orchestrator.as_ref());

        let second = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                ready_rx.await.unwrap();
                orchestrator.start().await
            })
        };

        orchestrator.start().await.unwrap();
        second.await.unwrap().unwrap();

        let names: Vec<&str> = events.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["progress", "progress", "complete", "progress", "progress", "complete"]
        );
    }

    #[tokio::test]
    async fn test_stop_and_unsubscribe_during_run() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sink = GatedSink {
            entered: entered.clone(),
            release: release.clone(),
        };
        let orchestrator = Arc::new(IngestionOrchestrator::new(generator(30, 10), sink));
        let events = record_events(orchestrator.as_ref());
        let muted = Arc::new(Mutex::new(0usize));
        let muted_id = {
            let muted = muted.clone();
            orchestrator.subscribe(move |_: &IngestEvent| *muted.lock().unwrap() += 1)
        };

        let runner = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start().await })
        };

        entered.notified().await;
        assert!(orchestrator.unsubscribe(muted_id));
        assert!(!orchestrator.unsubscribe(muted_id));
        assert_eq!(orchestrator.current_progress().unwrap().total, 30);
        orchestrator.stop();
        release.notify_one();

        let summary = runner.await.unwrap().unwrap();
        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.processed, 10);
        assert_eq!(*muted.lock().unwrap(), 0);

        let names: Vec<&str> = events.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["progress", "stopped"]);
    }

    #[tokio::test]
    async fn test_restart_resets_counters() {
        let sink = ScriptedSink::default();
        let batches = sink.batches.clone();
        let orchestrator = IngestionOrchestrator::new(generator(30, 10), sink);

        let first = orchestrator.start().await.unwrap();
        let second = orchestrator.start().await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.processed, 30);
        assert_eq!(batches.lock().unwrap().len(), 6);
        assert_eq!(orchestrator.status().processed, 30);
    }

    #[tokio::test]
    async fn test_start_with_caller_id() {
        let orchestrator = IngestionOrchestrator::new(generator(10, 10), MemorySink::new());
        let run_id = Uuid::new_v4();

        let summary = orchestrator.start_with_id(run_id).await.unwrap();
        assert_eq!(summary.run_id, run_id);
        assert_eq!(orchestrator.status().run_id, Some(run_id));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let orchestrator = IngestionOrchestrator::new(generator(20, 10), MemorySink::new());
        orchestrator.stop();
        orchestrator.stop();

        let summary = orchestrator.start().await.unwrap();
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.processed, 20);
    }

    #[tokio::test]
    async fn test_progress_query_requires_active_run() {
        let orchestrator = IngestionOrchestrator::new(generator(10, 10), MemorySink::new());
        assert_eq!(orchestrator.current_progress().unwrap_err(), IngestError::NotRunning);
        assert_eq!(orchestrator.status().state, RunState::Idle);

        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.current_progress().unwrap_err(), IngestError::NotRunning);
    }

    #[tokio::test]
    async fn test_close_reaches_writer() {
        let sink = MemorySink::new();
        let store = sink.store();
        let orchestrator = IngestionOrchestrator::new(generator(10, 5), sink);

        orchestrator.start().await.unwrap();
        tokio_test::assert_ok!(orchestrator.close().await);
        assert!(store.is_closed());
        assert_eq!(store.points().len(), 10);
        assert_eq!(orchestrator.close().await, Err(WriteError::Closed));
    }

    #[test]
    fn test_config_values_exposed() {
        let orchestrator = IngestionOrchestrator::new(generator(42, 8), MemorySink::new());
        assert_eq!(orchestrator.total_target(), 42);
        assert_eq!(orchestrator.recommended_batch_size(), 8);
    }
}

//! In-memory sink used for dry runs and tests.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt};

use crate::models::Trade;

use super::{Point, SinkWriter, WriteError};

#[derive(Debug, Default)]
struct Stored {
    points: Vec<Point>,
    batch_sizes: Vec<usize>,
    closed: bool,
}

/// Read handle onto what a `MemorySink` has accepted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Stored>>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Stored> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Retained points, in write order.
    pub fn points(&self) -> Vec<Point> {
        self.lock().points.clone()
    }

    /// Size of every accepted batch, in write order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    /// Total trades accepted (retained or not).
    pub fn total_written(&self) -> usize {
        self.lock().batch_sizes.iter().sum()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Sink that keeps mapped points in memory.
pub struct MemorySink {
    store: MemoryStore,
    retain_points: bool,
}

impl MemorySink {
    /// Sink that retains every point.
    pub fn new() -> Self {
        Self {
            store: MemoryStore::default(),
            retain_points: true,
        }
    }

    /// Sink that only counts batches (for large dry runs).
    pub fn counting() -> Self {
        Self {
            store: MemoryStore::default(),
            retain_points: false,
        }
    }

    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkWriter for MemorySink {
    fn write_batch<'a>(
        &'a mut self,
        trades: &'a [Trade],
    ) -> BoxFuture<'a, Result<(), WriteError>> {
        async move {
            let mut stored = self.store.lock();
            if stored.closed {
                return Err(WriteError::Closed);
            }
            if self.retain_points {
                stored.points.extend(trades.iter().map(Point::from_trade));
            }
            stored.batch_sizes.push(trades.len());
            Ok(())
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), WriteError>> {
        async move {
            let mut stored = self.store.lock();
            if stored.closed {
                return Err(WriteError::Closed);
            }
            stored.closed = true;
            Ok(())
        }
        .boxed()
    }
}

//! The batched write contract every time-series sink implements.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::models::Trade;

/// Failure reported by a sink for a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The store answered with a non-success status.
    #[error("sink rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never reached the store (DNS, connect, timeout).
    #[error("sink transport error: {0}")]
    Transport(String),

    /// `write_batch` or `close` after `close`.
    #[error("sink writer is closed")]
    Closed,
}

/// Batched writer for a time-series store.
///
/// `write_batch` resolves once the whole batch is accepted, or fails once with a
/// single `WriteError`; partial success is never reported. Internal buffering and
/// retries are up to the implementation. `close` must be called exactly once;
/// afterwards every call fails with `WriteError::Closed`.
pub trait SinkWriter: Send {
    fn write_batch<'a>(
        &'a mut self,
        trades: &'a [Trade],
    ) -> BoxFuture<'a, Result<(), WriteError>>;

    fn close(&mut self) -> BoxFuture<'_, Result<(), WriteError>>;
}

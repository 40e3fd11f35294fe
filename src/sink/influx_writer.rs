//! InfluxDB v2 writer: line protocol over HTTP with jittered exponential backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoffBuilder;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::Trade;

use super::{Point, SinkWriter, WriteError};

/// Connection and retry settings for the InfluxDB writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL, e.g. http://localhost:8086
    pub url: String,

    /// API token (sent as `Authorization: Token ...`)
    #[serde(skip_serializing)]
    pub token: String,

    pub org: String,

    pub bucket: String,

    /// Upper bound on lines per HTTP request
    pub max_points_per_request: usize,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// First retry delay
    pub initial_retry_interval: Duration,

    /// Cap on a single retry delay
    pub max_retry_interval: Duration,

    /// Give up on a request after retrying this long
    pub max_retry_elapsed: Duration,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: "trading".to_string(),
            bucket: "trades".to_string(),
            max_points_per_request: 5_000,
            request_timeout: Duration::from_secs(30),
            initial_retry_interval: Duration::from_millis(500),
            max_retry_interval: Duration::from_secs(10),
            max_retry_elapsed: Duration::from_secs(60), // ~6 attempts
        }
    }
}

/// Writes trade batches to the InfluxDB `/api/v2/write` endpoint.
pub struct InfluxWriter {
    client: Client,
    config: InfluxConfig,
    write_url: String,
    points_written: u64,
    closed: bool,
}

impl InfluxWriter {
    /// Create a writer for the configured bucket.
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let write_url = format!("{}/api/v2/write", config.url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            write_url,
            points_written: 0,
            closed: false,
        })
    }

    /// Points accepted by the store so far.
    pub fn points_written(&self) -> u64 {
        self.points_written
    }

    /// POST one body, retrying transient failures.
    async fn send_lines(&self, body: String) -> Result<(), WriteError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_retry_interval)
            .with_max_interval(self.config.max_retry_interval)
            .with_max_elapsed_time(Some(self.config.max_retry_elapsed))
            .build();

        backoff::future::retry_notify(
            policy,
            || self.post_once(body.clone()),
            |err: WriteError, delay: Duration| {
                warn!(error = %err, delay_ms = delay.as_millis() as u64, "Write failed, retrying");
            },
        )
        .await
    }

    async fn post_once(&self, body: String) -> Result<(), backoff::Error<WriteError>> {
        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.config.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(WriteError::Transport(e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let err = WriteError::Rejected {
            status: status.as_u16(),
            body,
        };

        if is_retryable(status) {
            Err(backoff::Error::transient(err))
        } else {
            Err(backoff::Error::permanent(err))
        }
    }
}

/// Throttling and server-side failures are worth retrying; other 4xx are not.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl SinkWriter for InfluxWriter {
    fn write_batch<'a>(
        &'a mut self,
        trades: &'a [Trade],
    ) -> BoxFuture<'a, Result<(), WriteError>> {
        async move {
            if self.closed {
                return Err(WriteError::Closed);
            }

            for chunk in trades.chunks(self.config.max_points_per_request.max(1)) {
                let body = chunk
                    .iter()
                    .map(|trade| Point::from_trade(trade).to_line_protocol())
                    .collect::<Vec<_>>()
                    .join("\n");

                self.send_lines(body).await?;
                self.points_written += chunk.len() as u64;
            }

            debug!(points = trades.len(), bucket = %self.config.bucket, "Batch written");
            Ok(())
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), WriteError>> {
        async move {
            if self.closed {
                return Err(WriteError::Closed);
            }
            // Nothing is buffered between batches; closing just retires the writer
            self.closed = true;
            info!(
                points_written = self.points_written,
                bucket = %self.config.bucket,
                "InfluxDB writer closed"
            );
            Ok(())
        }
        .boxed()
    }
}

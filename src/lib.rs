//! Synthetic trade ingestion.
//!
//! Generates realistic synthetic trade records and streams them in bounded,
//! cancellable batches into a time-series store.
//!
//! - [`generator`] produces trades from a seeded or entropy-backed RNG
//! - [`sink`] defines the batched write contract and the InfluxDB writer
//! - [`ingest`] runs the generate -> write loop and publishes progress events
//! - [`db`] keeps a SQLite ledger of past runs

pub mod config;
pub mod db;
pub mod generator;
pub mod ingest;
pub mod models;
pub mod sink;

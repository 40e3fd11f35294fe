//! Generator configuration.

use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Symbols traded when none are configured.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "JPM", "V", "NFLX",
];

/// Configuration for synthetic trade generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Symbols trades are drawn from (uniformly)
    pub symbols: Vec<String>,

    /// Total number of trades a full run produces
    pub total_trades: u64,

    /// Trades generated and written per batch
    pub batch_size: usize,

    /// Inclusive lower bound for trade timestamps
    pub start_date: DateTime<Utc>,

    /// Exclusive upper bound for the random day offset
    pub end_date: DateTime<Utc>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            total_trades: 1_000_000,          // 1M trades per run
            batch_size: 5_000,                // 5k points per write
            start_date: utc_midnight(2024, 1, 1),
            end_date: utc_midnight(2025, 1, 1), // One calendar year
        }
    }
}

impl GeneratorConfig {
    /// Check the configuration can drive a generator.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("At least one symbol must be configured");
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            bail!("Symbol names must not be empty");
        }
        if self.batch_size == 0 {
            bail!("Batch size must be positive");
        }
        if self.start_date >= self.end_date {
            bail!(
                "Start date {} must be before end date {}",
                self.start_date,
                self.end_date
            );
        }
        Ok(())
    }
}

/// Midnight UTC on the given calendar day (epoch if the date does not exist).
pub fn utc_midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

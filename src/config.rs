//! Application configuration from CLI flags, environment variables and `.env`.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;

use crate::generator::GeneratorConfig;
use crate::sink::InfluxConfig;

/// Settings shared by every subcommand. Each flag falls back to an env var.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// InfluxDB base URL
    #[arg(long, env = "INFLUX_URL", default_value = "http://localhost:8086")]
    pub influx_url: String,

    /// InfluxDB API token
    #[arg(long, env = "INFLUX_TOKEN", default_value = "", hide_env_values = true)]
    pub influx_token: String,

    /// InfluxDB organization
    #[arg(long, env = "INFLUX_ORG", default_value = "trading")]
    pub influx_org: String,

    /// InfluxDB bucket trades are written to
    #[arg(long, env = "INFLUX_BUCKET", default_value = "trades")]
    pub influx_bucket: String,

    /// HTTP timeout per write request, in seconds
    #[arg(long, env = "INFLUX_TIMEOUT_SECS", default_value = "30")]
    pub influx_timeout_secs: u64,

    /// Total trades per run
    #[arg(long, env = "TOTAL_TRADES", default_value = "1000000")]
    pub total_trades: u64,

    /// Trades per batch
    #[arg(long, env = "BATCH_SIZE", default_value = "5000")]
    pub batch_size: usize,

    /// Comma-separated symbol list
    #[arg(long, env = "SYMBOLS", value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// First day of generated timestamps (YYYY-MM-DD, UTC)
    #[arg(long, env = "START_DATE")]
    pub start_date: Option<NaiveDate>,

    /// Day generated timestamps stop before (YYYY-MM-DD, UTC)
    #[arg(long, env = "END_DATE")]
    pub end_date: Option<NaiveDate>,

    /// Seed for reproducible generation
    #[arg(long, env = "RNG_SEED")]
    pub rng_seed: Option<u64>,
}

impl AppConfig {
    /// Build and validate the generator configuration.
    pub fn generator_config(&self) -> Result<GeneratorConfig> {
        let defaults = GeneratorConfig::default();

        let symbols = self
            .symbols
            .as_ref()
            .map(|symbols| {
                symbols
                    .iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|symbols| !symbols.is_empty())
            .unwrap_or(defaults.symbols);

        let config = GeneratorConfig {
            symbols,
            total_trades: self.total_trades,
            batch_size: self.batch_size,
            start_date: self.start_date.map(day_start).unwrap_or(defaults.start_date),
            end_date: self.end_date.map(day_start).unwrap_or(defaults.end_date),
        };

        config
            .validate()
            .context("Invalid generator configuration")?;

        Ok(config)
    }

    /// InfluxDB writer settings; retry tuning keeps its defaults.
    pub fn influx_config(&self) -> InfluxConfig {
        InfluxConfig {
            url: self.influx_url.clone(),
            token: self.influx_token.clone(),
            org: self.influx_org.clone(),
            bucket: self.influx_bucket.clone(),
            request_timeout: Duration::from_secs(self.influx_timeout_secs.max(1)),
            ..InfluxConfig::default()
        }
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

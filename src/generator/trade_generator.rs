//! Synthetic trade generator.
//!
//! Each symbol carries a baseline price that follows a small random walk.
//! Trade prices are drawn around the baseline, sizes follow a power law
//! biased toward small lots, and timestamps cluster in US trading hours.

use std::ops::Range;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::models::{Trade, TradeSide, ValidationError};

use super::GeneratorConfig;

/// Range baseline prices are seeded from.
const BASELINE_SEED_RANGE: Range<f64> = 50.0..500.0;

/// Max deviation of an emitted price from the baseline (5%).
const PRICE_VARIATION: f64 = 0.05;

/// Max random-walk step applied to the baseline after each draw (0.5%).
const BASELINE_DRIFT: f64 = 0.005;

/// Largest lot before the +1 offset.
const MAX_LOT: f64 = 1000.0;

/// 9:30-16:00 US Eastern expressed in UTC, ignoring daylight saving.
const TRADING_HOURS_UTC: Range<u32> = 14..21;

/// Produces batches of synthetic trades.
pub struct TradeGenerator<R: Rng = StdRng> {
    config: GeneratorConfig,
    /// Baseline price per symbol, indexed like `config.symbols`
    baselines: Vec<f64>,
    rng: R,
}

impl TradeGenerator<StdRng> {
    /// Create a generator seeded from OS entropy.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a reproducible generator.
    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> TradeGenerator<R> {
    /// Create a generator drawing from the given randomness source.
    pub fn with_rng(config: GeneratorConfig, mut rng: R) -> Result<Self> {
        config.validate()?;

        let baselines: Vec<f64> = config
            .symbols
            .iter()
            .map(|_| rng.gen_range(BASELINE_SEED_RANGE))
            .collect();

        debug!(
            symbols = config.symbols.len(),
            total = config.total_trades,
            batch_size = config.batch_size,
            "Trade generator initialized"
        );

        Ok(Self {
            config,
            baselines,
            rng,
        })
    }

    /// Generate `count` trades. The caller clips `count` to the remaining target.
    pub fn generate_batch(&mut self, count: usize) -> Result<Vec<Trade>, ValidationError> {
        let mut trades = Vec::with_capacity(count);
        for _ in 0..count {
            trades.push(self.generate_trade()?);
        }
        Ok(trades)
    }

    /// Total number of trades a run should produce.
    pub fn total_target(&self) -> u64 {
        self.config.total_trades
    }

    /// Configured batch size.
    pub fn recommended_batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    fn generate_trade(&mut self) -> Result<Trade, ValidationError> {
        let index = self.rng.gen_range(0..self.config.symbols.len());
        let side = if self.rng.gen_bool(0.5) {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let price = self.next_price(index);
        let amount = self.next_amount();
        let timestamp = self.next_timestamp();

        Trade::new(
            self.config.symbols[index].clone(),
            side,
            price,
            amount,
            timestamp,
        )
    }

    /// Draw a price around the symbol's baseline, then step the baseline.
    fn next_price(&mut self, index: usize) -> Decimal {
        let baseline = self.baselines[index];

        let variation = self.rng.gen_range(-PRICE_VARIATION..=PRICE_VARIATION);
        let price = baseline * (1.0 + variation);

        let drift = self.rng.gen_range(-BASELINE_DRIFT..=BASELINE_DRIFT);
        self.baselines[index] = baseline * (1.0 + drift);

        // NaN/inf maps to zero and is rejected by Trade::new
        Decimal::from_f64(price)
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// floor(u^2 * 1000) + 1, always >= 1.
    fn next_amount(&mut self) -> u32 {
        let u: f64 = self.rng.gen();
        (u * u * MAX_LOT).floor() as u32 + 1
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let start = self.config.start_date;
        let end = self.config.end_date;

        let span_ms = (end - start).num_milliseconds().max(1);
        let offset_ms = self.rng.gen_range(0..span_ms);
        let day = start + Duration::milliseconds(offset_ms);

        let hour = self.rng.gen_range(TRADING_HOURS_UTC);
        let minute = self.rng.gen_range(0..60);
        let second = self.rng.gen_range(0..60);
        let milli = self.rng.gen_range(0..1000);

        let timestamp = NaiveTime::from_hms_milli_opt(hour, minute, second, milli)
            .map(|time| day.date_naive().and_time(time).and_utc())
            .unwrap_or(day);

        // Only matters when the bounds are not day-aligned
        timestamp.clamp(start, end)
    }
}

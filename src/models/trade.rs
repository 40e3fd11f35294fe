//! Trade model representing a single synthetic execution.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub const ALL: [TradeSide; 2] = [TradeSide::Buy, TradeSide::Sell];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    /// Lowercase form written as the `side` tag.
    pub fn as_tag(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a trade cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("trade symbol must not be empty")]
    EmptySymbol,

    #[error("trade price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("trade amount must be positive")]
    NonPositiveAmount,

    #[error("trade timestamp {0} is before the unix epoch")]
    InvalidTimestamp(DateTime<Utc>),
}

/// Immutable trade record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    symbol: String,
    side: TradeSide,
    /// Price per share, two decimal places
    price: Decimal,
    amount: u32,
    timestamp: DateTime<Utc>,
}

impl Trade {
    /// Build a validated trade.
    pub fn new(
        symbol: impl Into<String>,
        side: TradeSide,
        price: Decimal,
        amount: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice(price));
        }
        if amount == 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        if timestamp.timestamp_millis() < 0 {
            return Err(ValidationError::InvalidTimestamp(timestamp));
        }

        Ok(Self {
            symbol,
            side,
            price,
            amount,
            timestamp,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

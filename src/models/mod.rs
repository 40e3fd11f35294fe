//! Data models for synthetic trades.

mod trade;

pub use trade::{Trade, TradeSide, ValidationError};

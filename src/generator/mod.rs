//! Synthetic trade generation: configuration and the random-walk generator.

mod config;
mod trade_generator;

pub use config::{utc_midnight, GeneratorConfig, DEFAULT_SYMBOLS};
pub use trade_generator::TradeGenerator;

//! Time-series sinks: the write contract, point schema, and implementations.

mod influx_writer;
mod memory_sink;
mod point;
mod writer;

pub use influx_writer::{InfluxConfig, InfluxWriter};
pub use memory_sink::{MemorySink, MemoryStore};
pub use point::{FieldValue, Point, TRADE_MEASUREMENT};
pub use writer::{SinkWriter, WriteError};

//! Time-series point schema and InfluxDB line protocol rendering.

use rust_decimal::prelude::ToPrimitive;

use crate::models::Trade;

/// Measurement every trade is written under.
pub const TRADE_MEASUREMENT: &str = "trade";

/// Typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// One record in the time-series store.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    /// Event time in epoch milliseconds
    pub timestamp_ms: i64,
}

impl Point {
    /// Map a trade onto the `trade` measurement.
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            measurement: TRADE_MEASUREMENT.to_string(),
            tags: vec![
                ("symbol".to_string(), trade.symbol().to_string()),
                ("side".to_string(), trade.side().as_tag().to_string()),
            ],
            fields: vec![
                (
                    "price".to_string(),
                    FieldValue::Float(trade.price().to_f64().unwrap_or_default()),
                ),
                (
                    "amount".to_string(),
                    FieldValue::Integer(i64::from(trade.amount())),
                ),
            ],
            timestamp_ms: trade.timestamp().timestamp_millis(),
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Render as a single line protocol record (millisecond precision).
    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(96);
        escape_into(&mut line, &self.measurement, false);

        for (key, value) in &self.tags {
            line.push(',');
            escape_into(&mut line, key, true);
            line.push('=');
            escape_into(&mut line, value, true);
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            escape_into(&mut line, key, true);
            line.push('=');
            match value {
                FieldValue::Float(v) => line.push_str(&v.to_string()),
                FieldValue::Integer(v) => {
                    line.push_str(&v.to_string());
                    line.push('i');
                }
            }
        }

        line.push(' ');
        line.push_str(&self.timestamp_ms.to_string());
        line
    }
}

/// Escape commas and spaces, plus `=` for keys and tag values.
///
/// Line breaks would end the record, so they are written as `\n` / `\r`.
fn escape_into(out: &mut String, raw: &str, escape_equals: bool) {
    for c in raw.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ',' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '=' if escape_equals => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}

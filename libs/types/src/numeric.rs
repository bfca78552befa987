//! Decimal helpers for prices and quantities
//!
//! Order entry values arrive as strings from web clients and are parsed
//! into `Decimal`. Values reported by the terminal arrive as doubles, with
//! the maximum double standing for "unset".

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Sentinel the terminal uses for doubles that carry no value
pub const UNSET_DOUBLE: f64 = f64::MAX;

/// Parse an order-entry number: ASCII digits with at most one decimal point.
///
/// Signs, exponents and whitespace are rejected.
pub fn parse_entry_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() || raw == "." {
        return None;
    }
    let mut dots = 0;
    for c in raw.chars() {
        match c {
            '0'..='9' => {}
            '.' => dots += 1,
            _ => return None,
        }
    }
    if dots > 1 {
        return None;
    }
    Decimal::from_str(raw).ok()
}

/// Convert a broker double into a decimal, mapping the unset sentinel and
/// non-finite values to `None`.
pub fn from_broker_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() || value >= UNSET_DOUBLE {
        return None;
    }
    Decimal::from_f64(value)
}

//! Error types shared across the gateway
//!
//! Validation failures are returned to web clients as structured
//! responses, so their display strings are part of the external surface.

use thiserror::Error;

/// Malformed order-entry or order-management parameters
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid direction")]
    InvalidDirection,

    #[error("invalid orderType")]
    InvalidOrderType,

    #[error("invalid volume")]
    InvalidVolume,

    #[error("invalid price")]
    InvalidPrice,

    #[error("invalid order_id")]
    InvalidOrderId,

    #[error("order not found")]
    OrderNotFound,
}

/// Instrument string could not be turned into a contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("malformed instrument {0:?}, expected EXCHANGE.BASE_QUOTE.MARKET")]
    Malformed(String),

    #[error("unknown market {0:?}, expected FUTURE or SPOT")]
    UnknownMarket(String),
}

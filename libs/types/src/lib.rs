//! Types library for the terminal gateway
//!
//! This library provides the value types shared by the market-data,
//! session and gateway services. Every value published to subscribers is
//! defined here, so all surfaces serialize the same shapes.
//!
//! # Modules
//! - `ids`: Request and order identifiers (shared namespace) and their allocator
//! - `numeric`: Decimal parsing for order entry and broker sentinel handling
//! - `order`: Order entry tickets, order records and the status vocabulary
//! - `market`: Tick, depth and candle snapshots
//! - `contract`: Instrument contract and contract-detail snapshots
//! - `account`: Account value snapshots
//! - `position`: Position snapshots
//! - `errors`: Error taxonomy

// Public modules
pub mod account;
pub mod contract;
pub mod errors;
pub mod ids;
pub mod market;
pub mod numeric;
pub mod order;
pub mod position;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::*;
    pub use crate::contract::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::market::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::position::*;
}

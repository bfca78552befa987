//! Identifier types for requests and orders
//!
//! The upstream terminal keys every request by a signed integer id and
//! uses the same namespace for orders. The gateway keeps that single
//! namespace: an [`OrderId`] is just a [`RequestId`] that was used for an
//! order placement. Broker error events only carry a request id, so an
//! error can be matched against the order map by value (a heuristic, the
//! id may equally belong to a market-data request).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a request sent to the upstream terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(i64);

/// Orders share the request id namespace.
pub type OrderId = RequestId;

impl RequestId {
    /// Id used by the terminal for events not tied to any request
    pub const NO_VALID_ID: RequestId = RequestId(-1);

    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whether this id refers to an actual request
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(RequestId)
    }
}

impl From<i64> for RequestId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Monotonic allocator for request and order ids.
///
/// Ids are strictly increasing for the lifetime of the process. The
/// terminal announces the next id it will accept; [`seed`](Self::seed)
/// moves the allocator forward to it but never backwards.
#[derive(Debug, Clone, Default)]
pub struct RequestIdAllocator {
    last: i64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> RequestId {
        self.last += 1;
        RequestId(self.last)
    }

    /// Align with the terminal's next valid id.
    pub fn seed(&mut self, next_valid: RequestId) {
        let last = next_valid.0 - 1;
        if last > self.last {
            self.last = last;
        }
    }

    /// Last id handed out (0 before any allocation).
    pub fn last(&self) -> RequestId {
        RequestId(self.last)
    }
}

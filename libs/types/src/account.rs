//! Account value snapshots
//!
//! The terminal streams account values as `(key, value, currency, account)`
//! tuples. Only values for the configured account are kept; the snapshot
//! is a plain key -> value map plus the last update time under `time`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which the terminal's account update time is stored
pub const ACCOUNT_TIME_KEY: &str = "time";

/// Snapshot of account values for one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountSnapshot {
    values: BTreeMap<String, String>,
}

impl AccountSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Record the terminal's account update time.
    pub fn set_time(&mut self, timestamp: impl Into<String>) {
        self.values.insert(ACCOUNT_TIME_KEY.to_string(), timestamp.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_value() {
        let mut acct = AccountSnapshot::new();
        acct.set("AvailableFunds", "100");
        acct.set("AvailableFunds", "250.5");
        assert_eq!(acct.get("AvailableFunds"), Some("250.5"));
        assert_eq!(acct.len(), 1);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let mut acct = AccountSnapshot::new();
        acct.set("NetLiquidation", "1037870.12");
        acct.set_time("14:15");
        let json = serde_json::to_value(&acct).unwrap();
        assert_eq!(json["NetLiquidation"], "1037870.12");
        assert_eq!(json["time"], "14:15");
    }
}

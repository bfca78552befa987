//! Position snapshot for the configured account and instrument

use crate::contract::ContractSpec;
use serde::{Deserialize, Serialize};

/// Position reported by the terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub account: String,
    pub symbol: String,
    pub currency: String,
    pub position: f64,
    pub avg_cost: f64,
}

impl PositionInfo {
    /// Flat position, used when the terminal reports no position at all.
    pub fn flat(account: impl Into<String>, contract: &ContractSpec) -> Self {
        Self {
            account: account.into(),
            symbol: contract.symbol.clone(),
            currency: contract.currency.clone(),
            position: 0.0,
            avg_cost: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_position() {
        let contract = ContractSpec::from_instrument("SMART.XAU_USD.SPOT").unwrap();
        let pos = PositionInfo::flat("DU228384", &contract);
        assert_eq!(pos.symbol, "XAUUSD");
        assert_eq!(pos.position, 0.0);
        assert_eq!(pos.avg_cost, 0.0);
    }
}

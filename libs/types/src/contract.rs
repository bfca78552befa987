//! Instrument contract types
//!
//! The gateway trades exactly one instrument, configured as
//! `EXCHANGE.BASE_QUOTE.MARKET` (for example `SMART.XAU_USD.SPOT`).

use crate::errors::InstrumentError;
use serde::{Deserialize, Serialize};

/// Contract identifying the traded instrument on the terminal
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSpec {
    pub symbol: String,
    pub exchange: String,
    pub currency: String,
    pub sec_type: String,
}

impl ContractSpec {
    /// Build the contract from an instrument string.
    ///
    /// The symbol is the base asset quoted in USD; `FUTURE` maps to `FUT`
    /// and `SPOT` to `CMDTY`.
    pub fn from_instrument(instrument: &str) -> Result<Self, InstrumentError> {
        let upper = instrument.trim().to_uppercase();
        let parts: Vec<&str> = upper.split('.').collect();
        let [exchange, pair, market] = parts.as_slice() else {
            return Err(InstrumentError::Malformed(instrument.to_string()));
        };
        let base = pair.split('_').next().unwrap_or_default();
        if exchange.is_empty() || base.is_empty() {
            return Err(InstrumentError::Malformed(instrument.to_string()));
        }
        let sec_type = match *market {
            "FUTURE" => "FUT",
            "SPOT" => "CMDTY",
            other => return Err(InstrumentError::UnknownMarket(other.to_string())),
        };

        Ok(Self {
            symbol: format!("{}USD", base),
            exchange: exchange.to_string(),
            currency: "USD".to_string(),
            sec_type: sec_type.to_string(),
        })
    }
}

/// Contract details reported by the terminal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(rename = "symbol")]
    pub market_name: String,
    #[serde(rename = "minTick")]
    pub min_tick: f64,
    #[serde(rename = "xchg")]
    pub valid_exchanges: String,
    #[serde(rename = "longName")]
    pub long_name: String,
    #[serde(rename = "mdSizeMultiplier")]
    pub md_size_multiplier: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_instrument() {
        let c = ContractSpec::from_instrument("smart.xau_usd.spot").unwrap();
        assert_eq!(c.symbol, "XAUUSD");
        assert_eq!(c.exchange, "SMART");
        assert_eq!(c.currency, "USD");
        assert_eq!(c.sec_type, "CMDTY");
    }

    #[test]
    fn test_future_instrument() {
        let c = ContractSpec::from_instrument("NYMEX.CL_USD.FUTURE").unwrap();
        assert_eq!(c.symbol, "CLUSD");
        assert_eq!(c.sec_type, "FUT");
    }

    #[test]
    fn test_unknown_market_rejected() {
        let err = ContractSpec::from_instrument("SMART.XAU_USD.SWAP").unwrap_err();
        assert_eq!(err, InstrumentError::UnknownMarket("SWAP".to_string()));
    }

    #[test]
    fn test_malformed_instrument_rejected() {
        assert!(ContractSpec::from_instrument("XAUUSD").is_err());
        assert!(ContractSpec::from_instrument(".XAU_USD.SPOT").is_err());
    }

    #[test]
    fn test_contract_info_keys() {
        let info = ContractInfo {
            market_name: "XAUUSD".into(),
            min_tick: 0.01,
            valid_exchanges: "SMART".into(),
            long_name: "London Gold".into(),
            md_size_multiplier: 1,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["symbol"], "XAUUSD");
        assert_eq!(json["xchg"], "SMART");
        assert_eq!(json["mdSizeMultiplier"], 1);
    }
}

//! Order types
//!
//! An [`OrderRecord`] is the single authoritative view of one order. It is
//! created on local submission (or on the first broker acknowledgment of an
//! order placed elsewhere) and replaced wholesale on every update, so a
//! record already handed to a subscriber is never mutated.

use crate::contract::ContractSpec;
use crate::errors::ValidationError;
use crate::ids::OrderId;
use crate::numeric::{from_broker_f64, parse_entry_decimal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker the terminal puts in error text when an order was canceled
pub const CANCEL_MARKER: &str = "Order Canceled - reason";

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl FromStr for OrderAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(OrderAction::Buy),
            "SELL" => Ok(OrderAction::Sell),
            _ => Err(ValidationError::InvalidDirection),
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "BUY"),
            OrderAction::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type code.
///
/// Entry only accepts limit and market orders; acknowledgments from the
/// terminal may carry any other code, which is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderType {
    Limit,
    Market,
    Other(String),
}

impl OrderType {
    /// Parse an order-entry type, accepting only `LMT` and `MKT`.
    pub fn parse_entry(s: &str) -> Result<Self, ValidationError> {
        match OrderType::from(s.trim().to_uppercase()) {
            OrderType::Other(_) => Err(ValidationError::InvalidOrderType),
            known => Ok(known),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderType::Limit => "LMT",
            OrderType::Market => "MKT",
            OrderType::Other(code) => code,
        }
    }
}

impl From<String> for OrderType {
    fn from(code: String) -> Self {
        match code.as_str() {
            "LMT" => OrderType::Limit,
            "MKT" => OrderType::Market,
            _ => OrderType::Other(code),
        }
    }
}

impl From<OrderType> for String {
    fn from(order_type: OrderType) -> Self {
        order_type.as_str().to_string()
    }
}

/// Order status vocabulary exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingNew,
    PreSubmitted,
    Submitted,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Map a terminal status string onto the gateway vocabulary.
    pub fn from_broker(status: &str) -> Option<Self> {
        match status {
            "PendingNew" | "PendingSubmit" | "ApiPending" => Some(OrderStatus::PendingNew),
            "PreSubmitted" => Some(OrderStatus::PreSubmitted),
            "Submitted" | "PendingCancel" => Some(OrderStatus::Submitted),
            "Filled" => Some(OrderStatus::Filled),
            "Cancelled" | "ApiCancelled" => Some(OrderStatus::Cancelled),
            "Inactive" | "Rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    /// Status implied by a broker error message for a known order.
    pub fn from_error_text(text: &str) -> Self {
        if text.contains(CANCEL_MARKER) {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Rejected
        }
    }

    /// No further updates are expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Validated order entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTicket {
    pub action: OrderAction,
    pub order_type: OrderType,
    /// Present for limit orders only
    pub limit_price: Option<Decimal>,
    pub quantity: Decimal,
}

impl OrderTicket {
    /// Validate raw order-entry fields.
    ///
    /// Checks run in order: direction, order type, volume, then price
    /// (limit orders only); the first failure is reported.
    pub fn parse(
        direction: &str,
        order_type: &str,
        price: &str,
        volume: &str,
    ) -> Result<Self, ValidationError> {
        let action: OrderAction = direction.parse()?;
        let order_type = OrderType::parse_entry(order_type)?;

        let quantity = parse_entry_decimal(volume.trim())
            .filter(|q| !q.is_zero())
            .ok_or(ValidationError::InvalidVolume)?;

        let limit_price = match order_type {
            OrderType::Limit => Some(
                parse_entry_decimal(price.trim()).ok_or(ValidationError::InvalidPrice)?,
            ),
            _ => None,
        };

        Ok(Self {
            action,
            order_type,
            limit_price,
            quantity,
        })
    }
}

/// Order fields as acknowledged by the terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerOrder {
    pub perm_id: i64,
    pub action: OrderAction,
    pub total_quantity: f64,
    pub order_type: OrderType,
    pub limit_price: f64,
    pub aux_price: f64,
    #[serde(default)]
    pub time_in_force: String,
    #[serde(default)]
    pub account: String,
    pub contract: ContractSpec,
    pub status: String,
    pub commission: f64,
    #[serde(default)]
    pub completed_status: String,
    #[serde(default)]
    pub filled_quantity: f64,
    #[serde(default)]
    pub avg_fill_price: f64,
}

/// Status fields carried by a broker status event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Decimal,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// Authoritative record of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub perm_id: i64,
    pub action: OrderAction,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub aux_price: Option<Decimal>,
    pub time_in_force: String,
    pub account: String,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Decimal,
    pub commission: Option<Decimal>,
    pub completed_status: String,
    #[serde(flatten)]
    pub contract: ContractSpec,
    /// Unix milliseconds of the last change
    pub last_update_ts: i64,
}

impl OrderRecord {
    /// Record for a locally submitted order.
    ///
    /// The order is rejected up front when the terminal is not connected.
    pub fn submitted(
        order_id: OrderId,
        ticket: &OrderTicket,
        account: &str,
        contract: &ContractSpec,
        connected: bool,
        timestamp: i64,
    ) -> Self {
        let status = if connected {
            OrderStatus::PendingNew
        } else {
            OrderStatus::Rejected
        };
        Self {
            order_id,
            perm_id: 0,
            action: ticket.action,
            order_type: ticket.order_type.clone(),
            quantity: ticket.quantity,
            limit_price: ticket.limit_price,
            aux_price: None,
            time_in_force: String::new(),
            account: account.to_string(),
            status,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            commission: None,
            completed_status: String::new(),
            contract: contract.clone(),
            last_update_ts: timestamp,
        }
    }

    /// Record for an order first seen through a broker acknowledgment.
    pub fn from_broker(order_id: OrderId, broker: &BrokerOrder, status: OrderStatus, timestamp: i64) -> Self {
        Self {
            order_id,
            perm_id: broker.perm_id,
            action: broker.action,
            order_type: broker.order_type.clone(),
            quantity: from_broker_f64(broker.total_quantity).unwrap_or_default(),
            limit_price: from_broker_f64(broker.limit_price),
            aux_price: from_broker_f64(broker.aux_price),
            time_in_force: broker.time_in_force.clone(),
            account: broker.account.clone(),
            status,
            filled_quantity: from_broker_f64(broker.filled_quantity).unwrap_or_default(),
            avg_fill_price: from_broker_f64(broker.avg_fill_price).unwrap_or_default(),
            commission: from_broker_f64(broker.commission),
            completed_status: broker.completed_status.clone(),
            contract: broker.contract.clone(),
            last_update_ts: timestamp,
        }
    }

    /// Copy of this record with the broker-authoritative fields replaced.
    ///
    /// Locally known fields (action, quantity, account, fills) survive when
    /// the acknowledgment leaves them empty.
    pub fn acknowledged(&self, broker: &BrokerOrder, status: OrderStatus, timestamp: i64) -> Self {
        let mut next = self.clone();
        next.perm_id = broker.perm_id;
        next.order_type = broker.order_type.clone();
        next.limit_price = from_broker_f64(broker.limit_price);
        next.aux_price = from_broker_f64(broker.aux_price);
        next.time_in_force = broker.time_in_force.clone();
        next.commission = from_broker_f64(broker.commission);
        next.completed_status = broker.completed_status.clone();
        next.contract = broker.contract.clone();
        next.status = status;
        if let Some(quantity) = from_broker_f64(broker.total_quantity).filter(|q| !q.is_zero()) {
            next.quantity = quantity;
        }
        if !broker.account.is_empty() {
            next.account = broker.account.clone();
        }
        next.last_update_ts = timestamp;
        next
    }

    /// Copy of this record with a status update merged in.
    pub fn with_status(&self, update: &StatusUpdate) -> Self {
        let mut next = self.clone();
        next.status = update.status;
        next.filled_quantity = update.filled_quantity;
        next.avg_fill_price = update.avg_fill_price;
        next.last_update_ts = update.timestamp;
        next
    }

    /// Copy of this record marked failed by a broker error.
    pub fn with_error(&self, error_text: &str, timestamp: i64) -> Self {
        let mut next = self.clone();
        next.status = OrderStatus::from_error_text(error_text);
        next.last_update_ts = timestamp;
        next
    }

    /// Still working at the broker
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Submitted
    }
}

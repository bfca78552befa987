//! Inbound events from the upstream terminal.
//!
//! Decoding is delegated: the decoder turns a frame into an
//! [`InboundEvent`], and [`InboundEvent::dispatch`] invokes the matching
//! [`BrokerEvents`] method. Handlers never see wire formats.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use types::contract::{ContractInfo, ContractSpec};
use types::ids::RequestId;
use types::order::BrokerOrder;

/// Terminal error code for a frame that exceeds the length limit
pub const BAD_LENGTH: i32 = 507;

/// Terminal error code for a frame that could not be decoded
pub const BAD_MESSAGE: i32 = 505;

/// One 5-second real-time bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeBar {
    /// Bar start, Unix seconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub wap: f64,
    #[serde(default)]
    pub count: i64,
}

/// Portfolio line for one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioUpdate {
    pub contract: ContractSpec,
    pub position: f64,
    pub market_price: f64,
    pub market_value: f64,
    pub average_cost: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub account: String,
}

/// Order status fields as reported by the terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub status: String,
    pub filled: f64,
    pub remaining: f64,
    pub avg_fill_price: f64,
    #[serde(default)]
    pub perm_id: i64,
    #[serde(default)]
    pub last_fill_price: f64,
}

/// Execution report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub exec_id: String,
    pub order_id: RequestId,
    pub side: String,
    pub shares: f64,
    pub price: f64,
    #[serde(default)]
    pub time: String,
}

/// Decoded inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    ConnectAck,
    ConnectionClosed,
    NextValidId {
        order_id: RequestId,
    },
    CurrentTime {
        /// Unix seconds
        time: i64,
    },
    Error {
        req_id: RequestId,
        code: i32,
        message: String,
    },
    TickPrice {
        req_id: RequestId,
        tick_type: i32,
        price: f64,
    },
    TickSize {
        req_id: RequestId,
        tick_type: i32,
        size: f64,
    },
    TickString {
        req_id: RequestId,
        tick_type: i32,
        value: String,
    },
    MarketDepth {
        req_id: RequestId,
        position: i32,
        operation: i32,
        side: i32,
        price: f64,
        size: f64,
    },
    RealtimeBar {
        req_id: RequestId,
        bar: RealtimeBar,
    },
    ContractDetails {
        req_id: RequestId,
        details: ContractInfo,
    },
    ContractDetailsEnd {
        req_id: RequestId,
    },
    ManagedAccounts {
        accounts: String,
    },
    AccountValue {
        key: String,
        value: String,
        #[serde(default)]
        currency: String,
        account: String,
    },
    AccountTime {
        timestamp: String,
    },
    Portfolio(PortfolioUpdate),
    Position {
        account: String,
        contract: ContractSpec,
        position: f64,
        avg_cost: f64,
    },
    PositionEnd,
    OpenOrder {
        order_id: RequestId,
        order: BrokerOrder,
    },
    OrderStatus {
        order_id: RequestId,
        #[serde(flatten)]
        report: OrderStatusReport,
    },
    ExecDetails {
        req_id: RequestId,
        contract: ContractSpec,
        execution: Execution,
    },
}

/// One handler method per inbound event kind.
///
/// Informational events have logging defaults; state-bearing events must
/// be handled.
pub trait BrokerEvents {
    fn connect_ack(&mut self) {
        info!("Upstream connection acknowledged");
    }

    fn connection_closed(&mut self) {
        info!("Upstream connection closed");
    }

    fn next_valid_id(&mut self, order_id: RequestId);

    fn current_time(&mut self, unix_secs: i64);

    fn error(&mut self, req_id: RequestId, code: i32, message: &str);

    fn tick_price(&mut self, req_id: RequestId, tick_type: i32, price: f64);

    fn tick_size(&mut self, req_id: RequestId, tick_type: i32, size: f64);

    fn tick_string(&mut self, req_id: RequestId, tick_type: i32, value: &str) {
        debug!(%req_id, tick_type, value, "Tick string");
    }

    fn market_depth(
        &mut self,
        req_id: RequestId,
        position: i32,
        operation: i32,
        side: i32,
        price: f64,
        size: f64,
    );

    fn realtime_bar(&mut self, req_id: RequestId, bar: RealtimeBar);

    fn contract_details(&mut self, req_id: RequestId, details: ContractInfo);

    fn contract_details_end(&mut self, req_id: RequestId) {
        debug!(%req_id, "Contract details complete");
    }

    fn managed_accounts(&mut self, accounts: &str) {
        info!(accounts, "Managed accounts");
    }

    fn account_value(&mut self, key: &str, value: &str, currency: &str, account: &str);

    fn account_time(&mut self, timestamp: &str);

    fn portfolio(&mut self, update: PortfolioUpdate) {
        debug!(
            account = %update.account,
            symbol = %update.contract.symbol,
            position = update.position,
            unrealized_pnl = update.unrealized_pnl,
            "Portfolio update"
        );
    }

    fn position(&mut self, account: &str, contract: ContractSpec, position: f64, avg_cost: f64);

    fn position_end(&mut self);

    fn open_order(&mut self, order_id: RequestId, order: BrokerOrder);

    fn order_status(&mut self, order_id: RequestId, report: OrderStatusReport);

    fn exec_details(&mut self, req_id: RequestId, contract: ContractSpec, execution: Execution) {
        info!(
            %req_id,
            order_id = %execution.order_id,
            exec_id = %execution.exec_id,
            symbol = %contract.symbol,
            side = %execution.side,
            shares = execution.shares,
            price = execution.price,
            "Execution"
        );
    }
}

impl InboundEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::ConnectAck => "connect_ack",
            InboundEvent::ConnectionClosed => "connection_closed",
            InboundEvent::NextValidId { .. } => "next_valid_id",
            InboundEvent::CurrentTime { .. } => "current_time",
            InboundEvent::Error { .. } => "error",
            InboundEvent::TickPrice { .. } => "tick_price",
            InboundEvent::TickSize { .. } => "tick_size",
            InboundEvent::TickString { .. } => "tick_string",
            InboundEvent::MarketDepth { .. } => "market_depth",
            InboundEvent::RealtimeBar { .. } => "realtime_bar",
            InboundEvent::ContractDetails { .. } => "contract_details",
            InboundEvent::ContractDetailsEnd { .. } => "contract_details_end",
            InboundEvent::ManagedAccounts { .. } => "managed_accounts",
            InboundEvent::AccountValue { .. } => "account_value",
            InboundEvent::AccountTime { .. } => "account_time",
            InboundEvent::Portfolio(_) => "portfolio",
            InboundEvent::Position { .. } => "position",
            InboundEvent::PositionEnd => "position_end",
            InboundEvent::OpenOrder { .. } => "open_order",
            InboundEvent::OrderStatus { .. } => "order_status",
            InboundEvent::ExecDetails { .. } => "exec_details",
        }
    }

    /// Invoke the handler method for this event.
    pub fn dispatch<H: BrokerEvents + ?Sized>(self, handler: &mut H) {
        match self {
            InboundEvent::ConnectAck => handler.connect_ack(),
            InboundEvent::ConnectionClosed => handler.connection_closed(),
            InboundEvent::NextValidId { order_id } => handler.next_valid_id(order_id),
            InboundEvent::CurrentTime { time } => handler.current_time(time),
            InboundEvent::Error {
                req_id,
                code,
                message,
            } => handler.error(req_id, code, &message),
            InboundEvent::TickPrice {
                req_id,
                tick_type,
                price,
            } => handler.tick_price(req_id, tick_type, price),
            InboundEvent::TickSize {
                req_id,
                tick_type,
                size,
            } => handler.tick_size(req_id, tick_type, size),
            InboundEvent::TickString {
                req_id,
                tick_type,
                value,
            } => handler.tick_string(req_id, tick_type, &value),
            InboundEvent::MarketDepth {
                req_id,
                position,
                operation,
                side,
                price,
                size,
            } => handler.market_depth(req_id, position, operation, side, price, size),
            InboundEvent::RealtimeBar { req_id, bar } => handler.realtime_bar(req_id, bar),
            InboundEvent::ContractDetails { req_id, details } => {
                handler.contract_details(req_id, details)
            }
            InboundEvent::ContractDetailsEnd { req_id } => handler.contract_details_end(req_id),
            InboundEvent::ManagedAccounts { accounts } => handler.managed_accounts(&accounts),
            InboundEvent::AccountValue {
                key,
                value,
                currency,
                account,
            } => handler.account_value(&key, &value, &currency, &account),
            InboundEvent::AccountTime { timestamp } => handler.account_time(&timestamp),
            InboundEvent::Portfolio(update) => handler.portfolio(update),
            InboundEvent::Position {
                account,
                contract,
                position,
                avg_cost,
            } => handler.position(&account, contract, position, avg_cost),
            InboundEvent::PositionEnd => handler.position_end(),
            InboundEvent::OpenOrder { order_id, order } => handler.open_order(order_id, order),
            InboundEvent::OrderStatus { order_id, report } => handler.order_status(order_id, report),
            InboundEvent::ExecDetails {
                req_id,
                contract,
                execution,
            } => handler.exec_details(req_id, contract, execution),
        }
    }
}

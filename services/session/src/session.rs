//! Upstream session
//!
//! Owns everything that mutates on the scheduling timeline: the
//! transport, the request-id allocator, the market data aggregator, the
//! order tracker and the account/position/contract snapshots. Inbound
//! events arrive through [`BrokerEvents`]; outbound requests leave
//! through [`Transport`].

use chrono::DateTime;
use market_data::depth::DepthUpdate;
use market_data::MarketDataAggregator;
use tracing::{debug, info, warn};
use types::account::AccountSnapshot;
use types::contract::{ContractInfo, ContractSpec};
use types::errors::{InstrumentError, ValidationError};
use types::ids::{OrderId, RequestId, RequestIdAllocator};
use types::market::{CandleBar, DEPTH_LEVELS};
use types::numeric::from_broker_f64;
use types::order::{BrokerOrder, OrderStatus, OrderTicket, StatusUpdate};
use types::position::PositionInfo;

use crate::alerts::AlertDispatcher;
use crate::config::{MarketDataConfig, SessionConfig, UpstreamConfig};
use crate::error::SessionError;
use crate::events::{
    BrokerEvents, OrderStatusReport, RealtimeBar, BAD_LENGTH, BAD_MESSAGE,
};
use crate::orders::OrderTracker;
use crate::transport::{Decoder, Endpoint, OutboundRequest, PlaceOrder, Transport};

/// Terminal codes 2100-2199 are informational notices, not failures.
fn is_notice(code: i32) -> bool {
    (2100..2200).contains(&code)
}

/// Result of one pump cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// No frame was waiting
    Idle,
    /// One event was decoded and handled
    Dispatched(&'static str),
    /// Frame violated framing rules; the session was disconnected
    Framing,
}

pub struct Session<T, D> {
    upstream: UpstreamConfig,
    market_config: MarketDataConfig,
    contract: ContractSpec,
    transport: T,
    decoder: D,
    ids: RequestIdAllocator,
    market: MarketDataAggregator,
    orders: OrderTracker,
    account: AccountSnapshot,
    position: Option<PositionInfo>,
    contract_info: Option<ContractInfo>,
    alerts: AlertDispatcher,
    link_up: bool,
    now_ms: i64,
}

impl<T: Transport, D: Decoder> Session<T, D> {
    pub fn new(
        config: &SessionConfig,
        transport: T,
        decoder: D,
        alerts: AlertDispatcher,
    ) -> Result<Self, InstrumentError> {
        let contract = ContractSpec::from_instrument(&config.upstream.instrument)?;
        Ok(Self {
            upstream: config.upstream.clone(),
            market_config: config.market_data.clone(),
            contract,
            transport,
            decoder,
            ids: RequestIdAllocator::new(),
            market: MarketDataAggregator::new(config.market_data.aggregator()),
            orders: OrderTracker::new(),
            account: AccountSnapshot::new(),
            position: None,
            contract_info: None,
            alerts,
            link_up: false,
            now_ms: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.upstream.host.clone(),
            port: self.upstream.port,
            client_id: self.upstream.client_id,
            connect_timeout: self.upstream.connect_timeout(),
        }
    }

    /// Open the transport and issue the subscription sequence.
    ///
    /// Returns `Ok(false)` when already connected. The attempt is abandoned
    /// after `connect_timeout_ms`, whatever the transport does.
    pub async fn connect(&mut self, now_ms: i64) -> Result<bool, SessionError> {
        if self.is_connected() {
            return Ok(false);
        }
        self.now_ms = now_ms;
        self.alerts.raise("Control: terminal running, connecting");

        let endpoint = self.endpoint();
        tokio::time::timeout(endpoint.connect_timeout, self.transport.connect(&endpoint))
            .await
            .map_err(|_| {
                SessionError::Transport(format!(
                    "connect to {}:{} timed out",
                    endpoint.host, endpoint.port
                ))
            })??;
        self.link_up = true;
        // Fresh connection: activity counts from now, not from before the outage.
        self.market.touch(now_ms);
        self.market.on_reconnect();

        self.send(&OutboundRequest::CurrentTime);
        let sent = self.subscribe();
        info!(host = %endpoint.host, port = endpoint.port, requests = sent, "Upstream session connected");
        Ok(true)
    }

    /// Issue the full subscription sequence. Returns the number of
    /// requests sent; nothing is sent while disconnected.
    pub fn subscribe(&mut self) -> usize {
        if !self.is_connected() {
            debug!("Subscribe skipped, not connected");
            return 0;
        }
        let contract = self.contract.clone();
        let requests = [
            OutboundRequest::MarketData {
                req_id: self.ids.next_id(),
                contract: contract.clone(),
            },
            OutboundRequest::MarketDepth {
                req_id: self.ids.next_id(),
                contract: contract.clone(),
                rows: DEPTH_LEVELS,
            },
            OutboundRequest::RealtimeBars {
                req_id: self.ids.next_id(),
                contract: contract.clone(),
                bar_size: self.market_config.bar_size_secs,
                what_to_show: self.market_config.bar_type.clone(),
            },
            OutboundRequest::ContractDetails {
                req_id: self.ids.next_id(),
                contract,
            },
            OutboundRequest::ManagedAccounts {
                req_id: self.ids.next_id(),
            },
            OutboundRequest::AccountUpdates {
                req_id: self.ids.next_id(),
                subscribe: true,
                account: self.upstream.account_id.clone(),
            },
            OutboundRequest::Positions {
                req_id: self.ids.next_id(),
            },
        ];

        let mut sent = 0;
        for request in &requests {
            if !self.send(request) {
                break;
            }
            sent += 1;
        }
        debug!(sent, last_req_id = %self.ids.last(), "Subscription sequence issued");
        sent
    }

    /// Close the transport. Idempotent.
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        if self.link_up {
            self.link_up = false;
            self.connection_closed();
        }
    }

    /// Record and place a validated order.
    pub fn submit_order(&mut self, ticket: &OrderTicket, now_ms: i64) -> OrderId {
        self.now_ms = now_ms;
        let order_id = self.ids.next_id();
        let connected = self.is_connected();
        let record = self.orders.submit(
            order_id,
            ticket,
            &self.upstream.account_id,
            &self.contract,
            connected,
            now_ms,
        );

        if connected {
            let request = OutboundRequest::PlaceOrder {
                order_id,
                contract: self.contract.clone(),
                order: PlaceOrder {
                    action: ticket.action,
                    order_type: ticket.order_type.clone(),
                    total_quantity: ticket.quantity,
                    limit_price: ticket.limit_price,
                    account: self.upstream.account_id.clone(),
                    client_id: self.upstream.client_id,
                },
            };
            self.send(&request);
            self.send(&OutboundRequest::NextIds { count: 1 });
        }
        info!(%order_id, status = ?record.status, "Order entry handled");
        order_id
    }

    /// Ask the terminal to cancel a known order.
    ///
    /// The record only changes once the terminal reports the new status.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<(), SessionError> {
        if !order_id.is_valid() {
            return Err(ValidationError::InvalidOrderId.into());
        }
        if !self.orders.contains(order_id) {
            return Err(ValidationError::OrderNotFound.into());
        }
        self.transport
            .send(&OutboundRequest::CancelOrder { order_id })?;
        info!(%order_id, "Cancel requested");
        Ok(())
    }

    /// Read and handle at most one inbound frame.
    pub fn pump_once(&mut self, now_ms: i64) -> PumpOutcome {
        self.now_ms = now_ms;
        let outcome = match self.transport.try_recv() {
            None => PumpOutcome::Idle,
            Some(frame) => self.handle_frame(&frame),
        };

        if self.link_up && !self.transport.is_connected() {
            warn!("Upstream connection lost");
            self.disconnect();
        }
        outcome
    }

    fn handle_frame(&mut self, frame: &[u8]) -> PumpOutcome {
        let max = self.upstream.max_message_len;
        if frame.len() > max {
            let message = format!("Bad message length:{}", frame.len());
            self.framing_failure(BAD_LENGTH, &message);
            return PumpOutcome::Framing;
        }

        match self.decoder.decode(frame) {
            Ok(event) => {
                let kind = event.kind();
                event.dispatch(self);
                PumpOutcome::Dispatched(kind)
            }
            Err(e) => {
                let message = format!("Bad message: {e}");
                self.framing_failure(BAD_MESSAGE, &message);
                PumpOutcome::Framing
            }
        }
    }

    fn framing_failure(&mut self, code: i32, message: &str) {
        let err = SessionError::TransportFraming(message.to_string());
        warn!(code, error = %err, "Dropping upstream connection");
        self.error(RequestId::NO_VALID_ID, code, message);
        self.disconnect();
    }

    /// Send and log failures; returns whether the request went out.
    fn send(&mut self, request: &OutboundRequest) -> bool {
        match self.transport.send(request) {
            Ok(()) => true,
            Err(e) => {
                warn!(req_id = ?request.req_id(), error = %e, "Request not sent");
                false
            }
        }
    }

    pub fn contract(&self) -> &ContractSpec {
        &self.contract
    }

    /// Contract details; empty until the terminal has answered.
    pub fn contract_info(&self) -> Option<&ContractInfo> {
        self.contract_info.as_ref()
    }

    pub fn position(&self) -> Option<&PositionInfo> {
        self.position.as_ref()
    }

    pub fn account(&self) -> &AccountSnapshot {
        &self.account
    }

    pub fn orders(&self) -> &OrderTracker {
        &self.orders
    }

    pub fn orders_mut(&mut self) -> &mut OrderTracker {
        &mut self.orders
    }

    pub fn market(&self) -> &MarketDataAggregator {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut MarketDataAggregator {
        &mut self.market
    }

    pub fn last_activity_ms(&self) -> i64 {
        self.market.last_activity_ms()
    }

    pub fn last_request_id(&self) -> RequestId {
        self.ids.last()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport, D: Decoder> BrokerEvents for Session<T, D> {
    fn connection_closed(&mut self) {
        self.link_up = false;
        info!("Upstream session disconnected");
    }

    fn next_valid_id(&mut self, order_id: RequestId) {
        self.ids.seed(order_id);
        debug!(%order_id, "Next valid id");
    }

    fn current_time(&mut self, unix_secs: i64) {
        match DateTime::from_timestamp(unix_secs, 0) {
            Some(server_time) => info!(server_time = %server_time.format("%Y-%m-%d %H:%M:%S"), "Server time"),
            None => warn!(unix_secs, "Server time out of range"),
        }
    }

    fn error(&mut self, req_id: RequestId, code: i32, message: &str) {
        if is_notice(code) {
            info!(%req_id, code, message, "Upstream notice");
            return;
        }
        let err = SessionError::UpstreamSession {
            req_id,
            code,
            message: message.to_string(),
        };
        warn!(error = %err, "Upstream error");
        self.alerts.raise(format!("TWS: {message}"));
        self.orders.report_error(req_id, message, self.now_ms);
    }

    fn tick_price(&mut self, _req_id: RequestId, tick_type: i32, price: f64) {
        self.market.ingest_tick(tick_type, Some(price), None, self.now_ms);
    }

    fn tick_size(&mut self, _req_id: RequestId, tick_type: i32, size: f64) {
        self.market.ingest_tick(tick_type, None, Some(size), self.now_ms);
    }

    fn market_depth(
        &mut self,
        _req_id: RequestId,
        position: i32,
        operation: i32,
        side: i32,
        price: f64,
        size: f64,
    ) {
        let update = DepthUpdate {
            position,
            operation,
            side,
            price,
            size,
        };
        self.market.ingest_depth(update, self.now_ms);
    }

    fn realtime_bar(&mut self, _req_id: RequestId, bar: RealtimeBar) {
        self.market.ingest_candle(CandleBar {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            wap: bar.wap,
            timestamp: bar.time,
        });
    }

    fn contract_details(&mut self, req_id: RequestId, details: ContractInfo) {
        debug!(%req_id, market = %details.market_name, min_tick = details.min_tick, "Contract details");
        self.contract_info = Some(details);
    }

    fn account_value(&mut self, key: &str, value: &str, _currency: &str, account: &str) {
        if account == self.upstream.account_id {
            self.account.set(key, value);
        }
    }

    fn account_time(&mut self, timestamp: &str) {
        self.account.set_time(timestamp);
        debug!(timestamp, "Account update time");
    }

    fn position(&mut self, account: &str, contract: ContractSpec, position: f64, avg_cost: f64) {
        if account != self.upstream.account_id {
            return;
        }
        self.position = Some(PositionInfo {
            account: account.to_string(),
            symbol: contract.symbol,
            currency: contract.currency,
            position,
            avg_cost,
        });
    }

    fn position_end(&mut self) {
        if self.position.is_none() {
            self.position = Some(PositionInfo::flat(
                self.upstream.account_id.clone(),
                &self.contract,
            ));
        }
        debug!("Position snapshot complete");
    }

    fn open_order(&mut self, order_id: RequestId, order: BrokerOrder) {
        self.orders.acknowledge(order_id, &order, self.now_ms);
    }

    fn order_status(&mut self, order_id: RequestId, report: OrderStatusReport) {
        let Some(status) = OrderStatus::from_broker(&report.status) else {
            warn!(%order_id, status = %report.status, "Unknown order status ignored");
            return;
        };
        let update = StatusUpdate {
            status,
            filled_quantity: from_broker_f64(report.filled).unwrap_or_default(),
            avg_fill_price: from_broker_f64(report.avg_fill_price).unwrap_or_default(),
            timestamp: self.now_ms,
        };
        self.orders.update_status(order_id, &update);
    }
}

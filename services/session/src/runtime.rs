//! Session runtime
//!
//! The single scheduling timeline. One task owns the [`Session`] and the
//! [`Supervisor`] and multiplexes:
//! - the health tick (30s, first tick immediate)
//! - the transport pump (100ms, one frame per cycle)
//! - results of blocking process control, marshalled back from the
//!   blocking pool
//! - commands from HTTP and WebSocket handlers via [`SessionHandle`]
//!
//! Nothing else touches session state, so nothing is locked. A health
//! tick is skipped while blocking work from an earlier tick is pending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use market_data::register::{DeliveryError, Subscriber, SubscriberId, Topic};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use types::account::AccountSnapshot;
use types::contract::ContractInfo;
use types::ids::OrderId;
use types::market::{CandleBar, DepthBook, TickSnapshot};
use types::order::{OrderRecord, OrderTicket};
use types::position::PositionInfo;

use crate::alerts::AlertDispatcher;
use crate::config::SupervisorConfig;
use crate::error::SessionError;
use crate::session::Session;
use crate::supervisor::{HealthReport, Supervisor, SupervisorAction};
use crate::transport::{Decoder, Transport};
use crate::watchdog::{ProcessControl, ProcessScan};

/// Capacity of the command queue
const COMMAND_BUFFER: usize = 256;

/// Source of wall-clock time for the timeline.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Requests from outer surfaces, answered on the timeline.
#[derive(Debug)]
pub enum Command {
    Contract {
        reply: oneshot::Sender<Option<ContractInfo>>,
    },
    Position {
        reply: oneshot::Sender<Option<PositionInfo>>,
    },
    Account {
        reply: oneshot::Sender<AccountSnapshot>,
    },
    QueryOrder {
        order_id: OrderId,
        reply: oneshot::Sender<Option<Arc<OrderRecord>>>,
    },
    OpenOrders {
        reply: oneshot::Sender<Vec<Arc<OrderRecord>>>,
    },
    PlaceOrder {
        ticket: OrderTicket,
        reply: oneshot::Sender<OrderId>,
    },
    CancelOrder {
        order_id: OrderId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Subscribe {
        topic: Topic,
        sink: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<SubscriberId>,
    },
    Unsubscribe {
        topic: Topic,
        id: SubscriberId,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Point-in-time view of the session for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub connected: bool,
    pub last_activity_ts: i64,
    pub open_orders: usize,
    pub health: HealthReport,
}

/// Subscriber that serializes each message to JSON text for a client.
pub fn json_forwarder<T>(sink: mpsc::UnboundedSender<String>) -> impl Subscriber<T>
where
    T: Serialize + Send + Sync + 'static,
{
    move |message: Arc<T>| -> Result<(), DeliveryError> {
        let text = serde_json::to_string(&*message)
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;
        sink.send(text).map_err(|_| DeliveryError::Closed)
    }
}

/// Cloneable handle used by HTTP and WebSocket handlers.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SessionError::RuntimeUnavailable)?;
        rx.await.map_err(|_| SessionError::RuntimeUnavailable)
    }

    pub async fn contract(&self) -> Result<Option<ContractInfo>, SessionError> {
        self.request(|reply| Command::Contract { reply }).await
    }

    pub async fn position(&self) -> Result<Option<PositionInfo>, SessionError> {
        self.request(|reply| Command::Position { reply }).await
    }

    pub async fn account(&self) -> Result<AccountSnapshot, SessionError> {
        self.request(|reply| Command::Account { reply }).await
    }

    pub async fn query_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Arc<OrderRecord>>, SessionError> {
        self.request(|reply| Command::QueryOrder { order_id, reply })
            .await
    }

    pub async fn open_orders(&self) -> Result<Vec<Arc<OrderRecord>>, SessionError> {
        self.request(|reply| Command::OpenOrders { reply }).await
    }

    pub async fn place_order(&self, ticket: OrderTicket) -> Result<OrderId, SessionError> {
        self.request(|reply| Command::PlaceOrder { ticket, reply })
            .await
    }

    pub async fn cancel_order(&self, order_id: OrderId) -> Result<(), SessionError> {
        self.request(|reply| Command::CancelOrder { order_id, reply })
            .await?
    }

    /// Register a client on `topic`; messages arrive as JSON text.
    pub async fn subscribe(
        &self,
        topic: Topic,
        sink: mpsc::UnboundedSender<String>,
    ) -> Result<SubscriberId, SessionError> {
        self.request(|reply| Command::Subscribe { topic, sink, reply })
            .await
    }

    pub async fn unsubscribe(&self, topic: Topic, id: SubscriberId) -> Result<(), SessionError> {
        self.tx
            .send(Command::Unsubscribe { topic, id })
            .await
            .map_err(|_| SessionError::RuntimeUnavailable)
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|reply| Command::Status { reply }).await
    }
}

/// Result of blocking work, marshalled back onto the timeline.
#[derive(Debug)]
enum Completion {
    Scan(Result<ProcessScan, SessionError>),
    Control {
        op: &'static str,
        result: Result<(), SessionError>,
    },
}

pub struct SessionRuntime<T, D, P> {
    session: Session<T, D>,
    supervisor: Supervisor,
    control: Arc<P>,
    alerts: AlertDispatcher,
    config: SupervisorConfig,
    clock: Clock,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<T, D, P> SessionRuntime<T, D, P>
where
    T: Transport,
    D: Decoder,
    P: ProcessControl,
{
    pub fn new(
        session: Session<T, D>,
        control: P,
        alerts: AlertDispatcher,
        config: SupervisorConfig,
    ) -> (Self, SessionHandle) {
        let clock: Clock = Arc::new(Utc::now);
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            session,
            supervisor: Supervisor::new(config.clone(), clock().date_naive()),
            control: Arc::new(control),
            alerts,
            config,
            clock,
            commands,
            completions_tx,
            completions_rx,
            in_flight: 0,
        };
        (runtime, SessionHandle { tx })
    }

    /// Replace the wall clock; the session date is reset to the new clock's date.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.supervisor = Supervisor::new(self.config.clone(), clock().date_naive());
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run until every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        let mut health = interval(self.config.health_interval());
        health.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut pump = interval(self.config.pump_interval());
        pump.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            health_interval_ms = self.config.health_interval_ms,
            pump_interval_ms = self.config.pump_interval_ms,
            "Session runtime started"
        );

        loop {
            tokio::select! {
                _ = health.tick() => self.on_health_tick(),
                _ = pump.tick() => {
                    let now_ms = self.now().timestamp_millis();
                    self.session.pump_once(now_ms);
                }
                Some(done) = self.completions_rx.recv() => self.on_completion(done).await,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        self.session.disconnect();
        info!("Session runtime stopped");
    }

    fn on_health_tick(&mut self) {
        if self.in_flight > 0 {
            debug!(pending = self.in_flight, "Health tick skipped, process control pending");
            return;
        }
        self.in_flight += 1;
        let control = Arc::clone(&self.control);
        let tx = self.completions_tx.clone();
        let handle = tokio::task::spawn_blocking(move || control.scan());
        tokio::spawn(async move {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SessionError::ProcessControl(format!("scan task failed: {e}")))
            });
            let _ = tx.send(Completion::Scan(result));
        });
    }

    fn spawn_control<F>(&mut self, op: &'static str, work: F)
    where
        F: FnOnce(&P) -> Result<(), SessionError> + Send + 'static,
    {
        self.in_flight += 1;
        let control = Arc::clone(&self.control);
        let tx = self.completions_tx.clone();
        let handle = tokio::task::spawn_blocking(move || work(control.as_ref()));
        tokio::spawn(async move {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SessionError::ProcessControl(format!("{op} task failed: {e}")))
            });
            let _ = tx.send(Completion::Control { op, result });
        });
    }

    async fn on_completion(&mut self, done: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match done {
            Completion::Scan(Ok(scan)) => {
                let now = self.now();
                let actions = self.supervisor.evaluate(
                    &scan,
                    self.session.is_connected(),
                    self.session.last_activity_ms(),
                    now,
                );
                for action in actions {
                    self.execute(action, now).await;
                }
            }
            Completion::Scan(Err(e)) => {
                warn!(error = %e, "Process scan failed, retrying next tick");
                self.alerts.raise(format!("Control: {e}"));
            }
            Completion::Control { op, result: Ok(()) } => {
                debug!(op, "Process control finished");
            }
            Completion::Control { op, result: Err(e) } => {
                warn!(op, error = %e, "Process control failed, retrying next tick");
                self.alerts.raise(format!("Control: {e}"));
            }
        }
    }

    async fn execute(&mut self, action: SupervisorAction, now: DateTime<Utc>) {
        debug!(action = ?action, "Supervisor action");
        match action {
            SupervisorAction::Alert(text) => self.alerts.raise(text),
            SupervisorAction::Disconnect => self.session.disconnect(),
            SupervisorAction::Kill(pids) => {
                if !pids.is_empty() {
                    self.spawn_control("kill", move |control| control.kill(&pids));
                }
            }
            SupervisorAction::Launch => self.spawn_control("launch", |control| control.launch()),
            SupervisorAction::Connect => {
                // Awaited on the timeline: pump and commands wait at most
                // `connect_timeout_ms` (5s by default) for the handshake.
                if let Err(e) = self.session.connect(now.timestamp_millis()).await {
                    warn!(error = %e, "Connect failed, retrying next tick");
                    self.alerts.raise(format!("Control: connect failed: {e}"));
                }
            }
            SupervisorAction::Resubscribe => {
                self.session.subscribe();
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Contract { reply } => {
                let _ = reply.send(self.session.contract_info().cloned());
            }
            Command::Position { reply } => {
                let _ = reply.send(self.session.position().cloned());
            }
            Command::Account { reply } => {
                let _ = reply.send(self.session.account().clone());
            }
            Command::QueryOrder { order_id, reply } => {
                let _ = reply.send(self.session.orders().query(order_id));
            }
            Command::OpenOrders { reply } => {
                let _ = reply.send(self.session.orders().list_open());
            }
            Command::PlaceOrder { ticket, reply } => {
                let now_ms = self.now().timestamp_millis();
                let order_id = self.session.submit_order(&ticket, now_ms);
                let _ = reply.send(order_id);
            }
            Command::CancelOrder { order_id, reply } => {
                let _ = reply.send(self.session.cancel_order(order_id));
            }
            Command::Subscribe { topic, sink, reply } => {
                let id = self.register(topic, sink);
                let _ = reply.send(id);
            }
            Command::Unsubscribe { topic, id } => {
                self.unregister(topic, id);
            }
            Command::Status { reply } => {
                let status = SessionStatus {
                    connected: self.session.is_connected(),
                    last_activity_ts: self.session.last_activity_ms(),
                    open_orders: self.session.orders().list_open().len(),
                    health: self.supervisor.report(),
                };
                let _ = reply.send(status);
            }
        }
    }

    fn register(&mut self, topic: Topic, sink: mpsc::UnboundedSender<String>) -> SubscriberId {
        let id = match topic {
            Topic::Trade => self
                .session
                .market_mut()
                .trades_topic()
                .register(json_forwarder::<TickSnapshot>(sink)),
            Topic::Depth => self
                .session
                .market_mut()
                .depth_topic()
                .register(json_forwarder::<DepthBook>(sink)),
            Topic::Candle => self
                .session
                .market_mut()
                .candle_topic()
                .register(json_forwarder::<CandleBar>(sink)),
            Topic::Order => self
                .session
                .orders_mut()
                .topic()
                .register(json_forwarder::<OrderRecord>(sink)),
        };
        info!(%topic, subscriber = %id, "Client subscribed");
        id
    }

    fn unregister(&mut self, topic: Topic, id: SubscriberId) {
        let removed = match topic {
            Topic::Trade => self.session.market_mut().trades_topic().unregister(id),
            Topic::Depth => self.session.market_mut().depth_topic().unregister(id),
            Topic::Candle => self.session.market_mut().candle_topic().unregister(id),
            Topic::Order => self.session.orders_mut().topic().unregister(id),
        };
        info!(%topic, subscriber = %id, removed, "Client unsubscribed");
    }
}

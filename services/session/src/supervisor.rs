//! Session supervisor
//!
//! Health state machine evaluated on every health tick. Each tick runs,
//! in order:
//! 1. multiple terminal processes: alert, disconnect, kill all
//! 2. no terminal process: on a trading day alert and relaunch
//! 3. one terminal process: connect on a trading day, otherwise alert,
//!    disconnect and kill (weekend cleanup)
//! 4. daily rollover: once per UTC date alert, disconnect and kill
//! 5. staleness: still connected but silent too long, alert and resubscribe
//!
//! The supervisor only decides; the runtime executes the returned
//! actions in order.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SupervisorConfig;
use crate::watchdog::{ProcessCount, ProcessScan};

/// Health of the upstream session as last evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    UpstreamAbsent,
    UpstreamMultiple,
    UpstreamPresentDisconnected,
    Connected,
    ConnectedStale,
}

/// Step the runtime must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    Alert(String),
    Disconnect,
    Kill(Vec<u32>),
    Launch,
    Connect,
    Resubscribe,
}

/// Observable supervisor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub state: ConnectionState,
    pub session_date: NaiveDate,
    pub last_activity_ts: i64,
    pub ticks: u64,
}

/// Weekdays are trading days.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    config: SupervisorConfig,
    state: ConnectionState,
    session_date: NaiveDate,
    last_activity_ts: i64,
    ticks: u64,
}

impl Supervisor {
    /// `today` becomes the session date; the first rollover happens on
    /// the next UTC date.
    pub fn new(config: SupervisorConfig, today: NaiveDate) -> Self {
        Self {
            config,
            state: ConnectionState::UpstreamPresentDisconnected,
            session_date: today,
            last_activity_ts: 0,
            ticks: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            state: self.state,
            session_date: self.session_date,
            last_activity_ts: self.last_activity_ts,
            ticks: self.ticks,
        }
    }

    /// Decide this tick's actions.
    pub fn evaluate(
        &mut self,
        scan: &ProcessScan,
        connected: bool,
        last_activity_ms: i64,
        now: DateTime<Utc>,
    ) -> Vec<SupervisorAction> {
        let mut actions = Vec::new();
        let today = now.date_naive();
        let trading_day = is_trading_day(today);
        let mut disconnected = false;
        self.ticks += 1;
        self.last_activity_ts = last_activity_ms;

        match scan.count() {
            ProcessCount::Multiple => {
                actions.push(SupervisorAction::Alert(format!(
                    "Control: {} terminal processes running, closing all",
                    scan.pids.len()
                )));
                actions.push(SupervisorAction::Disconnect);
                actions.push(SupervisorAction::Kill(scan.pids.clone()));
                disconnected = true;
                self.state = ConnectionState::UpstreamMultiple;
            }
            ProcessCount::Absent => {
                if trading_day {
                    actions.push(SupervisorAction::Alert(
                        "Control: terminal process lost, relaunching".to_string(),
                    ));
                    actions.push(SupervisorAction::Launch);
                }
                self.state = ConnectionState::UpstreamAbsent;
            }
            ProcessCount::Single => {
                if trading_day {
                    actions.push(SupervisorAction::Connect);
                    self.state = if connected {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::UpstreamPresentDisconnected
                    };
                } else {
                    actions.push(SupervisorAction::Alert(
                        "Control: closing terminal on weekend".to_string(),
                    ));
                    actions.push(SupervisorAction::Disconnect);
                    actions.push(SupervisorAction::Kill(scan.pids.clone()));
                    disconnected = true;
                    self.state = ConnectionState::UpstreamPresentDisconnected;
                }
            }
        }

        if self.session_date != today {
            info!(previous = %self.session_date, today = %today, "Daily rollover");
            actions.push(SupervisorAction::Alert(
                "Control: terminal daily relaunch".to_string(),
            ));
            actions.push(SupervisorAction::Disconnect);
            actions.push(SupervisorAction::Kill(scan.pids.clone()));
            disconnected = true;
            self.session_date = today;
            if self.state == ConnectionState::Connected {
                self.state = ConnectionState::UpstreamPresentDisconnected;
            }
        }

        if connected && !disconnected {
            let silent_ms = now.timestamp_millis() - last_activity_ms;
            if silent_ms > self.config.stale_after_ms {
                actions.push(SupervisorAction::Alert(format!(
                    "Control: no data received in {} secs",
                    silent_ms as f64 / 1000.0
                )));
                actions.push(SupervisorAction::Resubscribe);
                self.state = ConnectionState::ConnectedStale;
            }
        }

        debug!(state = ?self.state, actions = actions.len(), "Health tick evaluated");
        actions
    }
}

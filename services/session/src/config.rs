//! Configuration sections consumed by the session layer.
//!
//! Each component takes its own section through its constructor; the
//! gateway binary assembles them from file and environment.

use std::fmt;
use std::time::Duration;

use market_data::aggregator::AggregatorConfig;
use serde::{Deserialize, Serialize};

/// Default cap on a single inbound frame (16 MiB)
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 0xFF_FFFF;

/// Where and how to reach the upstream terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    /// Only values and positions for this account are kept
    pub account_id: String,
    /// `EXCHANGE.BASE_QUOTE.MARKET`, e.g. `SMART.XAU_USD.SPOT`
    pub instrument: String,
    pub max_message_len: usize,
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4002,
            client_id: 1,
            account_id: String::new(),
            instrument: "SMART.XAU_USD.SPOT".to_string(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            connect_timeout_ms: 5_000,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Health tick and pump cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub health_interval_ms: u64,
    pub pump_interval_ms: u64,
    /// Connected with no tick/depth activity for longer than this is stale
    pub stale_after_ms: i64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 30_000,
            pump_interval_ms: 100,
            stale_after_ms: 30_000,
        }
    }
}

impl SupervisorConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms)
    }
}

/// Market data subscription parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub bar_size_secs: u32,
    pub bar_type: String,
    pub bucket_ms: i64,
    pub reset_on_reconnect: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        let aggregator = AggregatorConfig::default();
        Self {
            bar_size_secs: 5,
            bar_type: "MIDPOINT".to_string(),
            bucket_ms: aggregator.bucket_ms,
            reset_on_reconnect: aggregator.reset_on_reconnect,
        }
    }
}

impl MarketDataConfig {
    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            bucket_ms: self.bucket_ms,
            reset_on_reconnect: self.reset_on_reconnect,
        }
    }
}

/// Terminal process control.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Executable name to look for, without a `.exe` suffix
    pub process_name: String,
    pub unix_script: String,
    pub windows_script: String,
    pub username: String,
    pub password: String,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            process_name: "java".to_string(),
            unix_script: "control-unix/gatewaystart.sh".to_string(),
            windows_script: "control-win/StartTWS.bat".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for WatchdogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogConfig")
            .field("process_name", &self.process_name)
            .field("unix_script", &self.unix_script)
            .field("windows_script", &self.windows_script)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Alert channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Markdown webhook; alerts are only logged when unset
    pub webhook_url: Option<String>,
    pub title: String,
    pub timeout_ms: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            title: "ib msg".to_string(),
            timeout_ms: 6_000,
        }
    }
}

/// Everything the session runtime needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub upstream: UpstreamConfig,
    pub supervisor: SupervisorConfig,
    pub market_data: MarketDataConfig,
    pub watchdog: WatchdogConfig,
    pub alerting: AlertingConfig,
}

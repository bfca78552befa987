//! Layered gateway configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `IBGW`-prefixed environment variables using `__` between
//! nested keys (e.g. `IBGW__UPSTREAM__PORT=7497`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use session::SessionConfig;
use session::config::{
    AlertingConfig, MarketDataConfig, SupervisorConfig, UpstreamConfig, WatchdogConfig,
};

/// File read when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP and WebSocket surface binds to
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// JSON log file; rotated hourly when set
    pub file: Option<PathBuf>,
    /// Rotated files kept on disk
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 30,
        }
    }
}

/// Top-level sections. Each session section is a named field so that
/// string values from the environment still coerce to numbers and bools.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub upstream: UpstreamConfig,
    pub supervisor: SupervisorConfig,
    pub market_data: MarketDataConfig,
    pub watchdog: WatchdogConfig,
    pub alerting: AlertingConfig,
}

impl GatewayConfig {
    /// Load configuration. An explicitly given file must exist; the
    /// default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix("IBGW"))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path.to_path_buf()).required(true),
            None => File::from(PathBuf::from(DEFAULT_CONFIG_PATH)).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(env.separator("__").ignore_empty(true))
            .build()
            .context("failed to read gateway configuration")?;

        config
            .try_deserialize()
            .context("invalid gateway configuration")
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            upstream: self.upstream.clone(),
            supervisor: self.supervisor.clone(),
            market_data: self.market_data.clone(),
            watchdog: self.watchdog.clone(),
            alerting: self.alerting.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{FileFormat, Map};

    fn from_toml(text: &str) -> GatewayConfig {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_empty_source_uses_defaults() {
        let config = from_toml("");
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.upstream.port, 4002);
        assert_eq!(config.watchdog.process_name, "java");
    }

    #[test]
    fn test_sections_layer_over_defaults() {
        let config = from_toml(
            r#"
            [server]
            listen = "127.0.0.1:9000"

            [upstream]
            port = 7497
            account_id = "DU228384"
            instrument = "SMART.XAU_USD.FUTURE"

            [market_data]
            reset_on_reconnect = true

            [alerting]
            webhook_url = "https://alerts.example.com/robot/send"
            "#,
        );
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.upstream.port, 7497);
        assert_eq!(config.upstream.host, "127.0.0.1");
        assert_eq!(config.upstream.account_id, "DU228384");
        assert!(config.market_data.reset_on_reconnect);
        assert_eq!(config.alerting.title, "ib msg");
        assert!(config.alerting.webhook_url.is_some());
    }

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Environment::with_prefix("IBGW").source(Some(source))
    }

    fn sample_file() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/gateway.toml")
    }

    #[test]
    fn test_environment_overrides_typed_fields() {
        let env = environment(&[
            ("IBGW__UPSTREAM__PORT", "7497"),
            ("IBGW__UPSTREAM__ACCOUNT_ID", "228384"),
            ("IBGW__MARKET_DATA__RESET_ON_RECONNECT", "true"),
            ("IBGW__SUPERVISOR__STALE_AFTER_MS", "45000"),
            ("IBGW__ALERTING__WEBHOOK_URL", "https://alerts.example.com/robot/send"),
            ("IBGW__LOGGING__MAX_FILES", "7"),
        ]);
        let config = GatewayConfig::load_with_env(Some(&sample_file()), env).unwrap();

        assert_eq!(config.upstream.port, 7497);
        assert_eq!(config.upstream.account_id, "228384");
        assert!(config.market_data.reset_on_reconnect);
        assert_eq!(config.supervisor.stale_after_ms, 45_000);
        assert_eq!(config.logging.max_files, 7);
        assert_eq!(config.upstream.host, "127.0.0.1");

        let session = config.session();
        assert_eq!(session.upstream.port, 7497);
        assert!(session.market_data.reset_on_reconnect);
        assert!(session.alerting.webhook_url.is_some());
    }

    #[test]
    fn test_environment_type_mismatch_is_error() {
        let env = environment(&[("IBGW__UPSTREAM__PORT", "not-a-port")]);
        assert!(GatewayConfig::load_with_env(Some(&sample_file()), env).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = GatewayConfig::load(Some(Path::new("/nonexistent/gateway.toml")));
        assert!(result.is_err());
    }
}

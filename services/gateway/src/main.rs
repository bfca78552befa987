mod error;
mod handlers;
mod logging;
mod models;
mod router;
mod settings;
mod state;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use router::create_router;
use session::alerts::AlertDispatcher;
use session::transport::{JsonDecoder, JsonLineTransport};
use session::watchdog::SystemProcessControl;
use session::{Session, SessionRuntime};
use settings::GatewayConfig;
use state::AppState;
use tokio::net::TcpListener;

/// How long the session runtime gets to disconnect after the server stops
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "gateway", about = "Trading terminal gateway")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "IBGW_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;
    logging::init_tracing(&config.logging)?;
    let session_config = config.session();

    tracing::info!(
        upstream = %format!("{}:{}", session_config.upstream.host, session_config.upstream.port),
        instrument = %session_config.upstream.instrument,
        account = %session_config.upstream.account_id,
        "Starting Gateway API service"
    );

    let (alerts, _alert_task) = AlertDispatcher::spawn(&session_config.alerting)?;
    let control = SystemProcessControl::new(session_config.watchdog.clone())?;
    let transport = JsonLineTransport::new(session_config.upstream.max_message_len);
    let session = Session::new(&session_config, transport, JsonDecoder, alerts.clone())?;
    let (runtime, handle) =
        SessionRuntime::new(session, control, alerts, session_config.supervisor.clone());
    let runtime_task = tokio::spawn(runtime.run());

    let app = create_router(AppState::new(handle));
    let listener = TcpListener::bind(&config.server.listen).await?;
    tracing::info!("Listening on {}", config.server.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The runtime stops once the last handle (held by the router) is gone.
    match tokio::time::timeout(SHUTDOWN_GRACE, runtime_task).await {
        Ok(joined) => joined?,
        Err(_) => tracing::warn!("Session runtime still busy at shutdown"),
    }
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

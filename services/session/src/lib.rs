//! Terminal Session Service
//!
//! Keeps one trading terminal process alive and one upstream session
//! connected to it:
//! - process watchdog (count, launch, kill)
//! - health supervision (weekend shutdown, daily relaunch, stale data)
//! - upstream event handling and subscription sequencing
//! - order lifecycle tracking
//! - operator alerts
//!
//! All mutable state lives on the single timeline driven by
//! [`runtime::SessionRuntime`]; outer surfaces talk to it through
//! [`runtime::SessionHandle`].

pub mod alerts;
pub mod config;
pub mod error;
pub mod events;
pub mod orders;
pub mod runtime;
pub mod session;
pub mod supervisor;
pub mod transport;
pub mod watchdog;

pub use config::SessionConfig;
pub use error::SessionError;
pub use runtime::{SessionHandle, SessionRuntime, SessionStatus};
pub use session::Session;

//! Error taxonomy for the session layer.
//!
//! None of these are fatal to the process: framing errors force a
//! disconnect, process-control errors are retried on the next health
//! tick, subscriber errors stay inside the register.

use market_data::DeliveryError;
use types::errors::ValidationError;
use types::ids::RequestId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Oversized or undecodable inbound frame
    #[error("transport framing error: {0}")]
    TransportFraming(String),

    /// Error reported by the terminal for a request or order id
    #[error("upstream error {code} for request {req_id}: {message}")]
    UpstreamSession {
        req_id: RequestId,
        code: i32,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Process enumeration, launch or kill failed
    #[error("process control failed: {0}")]
    ProcessControl(String),

    #[error(transparent)]
    Subscriber(#[from] DeliveryError),

    /// Connect or send failure on the upstream transport
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    /// The runtime that owns the session has stopped
    #[error("session runtime unavailable")]
    RuntimeUnavailable,
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_passes_through() {
        let err: SessionError = ValidationError::InvalidPrice.into();
        assert_eq!(err.to_string(), "invalid price");
    }

    #[test]
    fn test_upstream_error_display() {
        let err = SessionError::UpstreamSession {
            req_id: RequestId::new(7),
            code: 202,
            message: "Order Canceled - reason:".into(),
        };
        assert_eq!(
            err.to_string(),
            "upstream error 202 for request 7: Order Canceled - reason:"
        );
    }
}

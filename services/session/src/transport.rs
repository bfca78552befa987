//! Transport seam to the upstream terminal.
//!
//! The session speaks to the terminal through [`Transport`] and reads
//! events through a [`Decoder`]. Wire-level protocol work is delegated to
//! an external bridge process; the transport shipped here exchanges
//! newline-delimited JSON with that bridge over TCP:
//! - outbound: one [`OutboundRequest`] per line
//! - inbound: one [`InboundEvent`](crate::events::InboundEvent) per line

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::contract::ContractSpec;
use types::ids::{OrderId, RequestId};
use types::order::{OrderAction, OrderType};

use crate::error::SessionError;
use crate::events::InboundEvent;

/// Address of the upstream terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    pub connect_timeout: Duration,
}

/// Order fields sent with a place-order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub action: OrderAction,
    pub order_type: OrderType,
    pub total_quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub account: String,
    pub client_id: i32,
}

/// Requests issued to the terminal. All are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum OutboundRequest {
    CurrentTime,
    MarketData {
        req_id: RequestId,
        contract: ContractSpec,
    },
    MarketDepth {
        req_id: RequestId,
        contract: ContractSpec,
        rows: usize,
    },
    RealtimeBars {
        req_id: RequestId,
        contract: ContractSpec,
        bar_size: u32,
        what_to_show: String,
    },
    ContractDetails {
        req_id: RequestId,
        contract: ContractSpec,
    },
    ManagedAccounts {
        req_id: RequestId,
    },
    AccountUpdates {
        req_id: RequestId,
        subscribe: bool,
        account: String,
    },
    Positions {
        req_id: RequestId,
    },
    PlaceOrder {
        order_id: OrderId,
        contract: ContractSpec,
        order: PlaceOrder,
    },
    CancelOrder {
        order_id: OrderId,
    },
    NextIds {
        count: i32,
    },
}

impl OutboundRequest {
    /// Request id carried by subscription requests.
    pub fn req_id(&self) -> Option<RequestId> {
        match self {
            OutboundRequest::MarketData { req_id, .. }
            | OutboundRequest::MarketDepth { req_id, .. }
            | OutboundRequest::RealtimeBars { req_id, .. }
            | OutboundRequest::ContractDetails { req_id, .. }
            | OutboundRequest::ManagedAccounts { req_id }
            | OutboundRequest::AccountUpdates { req_id, .. }
            | OutboundRequest::Positions { req_id } => Some(*req_id),
            OutboundRequest::PlaceOrder { order_id, .. }
            | OutboundRequest::CancelOrder { order_id } => Some(*order_id),
            OutboundRequest::CurrentTime | OutboundRequest::NextIds { .. } => None,
        }
    }
}

/// Connection to the terminal, driven from the scheduling timeline.
///
/// Everything except `connect` must return immediately.
#[async_trait]
pub trait Transport: Send + 'static {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), SessionError>;

    /// Close the connection. Idempotent.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn send(&mut self, request: &OutboundRequest) -> Result<(), SessionError>;

    /// Next raw inbound frame, if one is waiting.
    fn try_recv(&mut self) -> Option<Vec<u8>>;
}

/// Turns a raw frame into an event.
pub trait Decoder: Send + 'static {
    fn decode(&self, frame: &[u8]) -> Result<InboundEvent, SessionError>;
}

/// Decoder for JSON-encoded events.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, frame: &[u8]) -> Result<InboundEvent, SessionError> {
        serde_json::from_slice(frame).map_err(|e| SessionError::Decode(e.to_string()))
    }
}

/// Newline-delimited JSON over TCP to the protocol bridge.
pub struct JsonLineTransport {
    max_frame_len: usize,
    connected: Arc<AtomicBool>,
    inbound: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl JsonLineTransport {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            connected: Arc::new(AtomicBool::new(false)),
            inbound: None,
            outbound: None,
            tasks: Vec::new(),
        }
    }

    fn teardown(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.inbound = None;
        self.outbound = None;
    }
}

#[async_trait]
impl Transport for JsonLineTransport {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), SessionError> {
        if self.is_connected() {
            return Ok(());
        }
        self.teardown();

        let addr = (endpoint.host.as_str(), endpoint.port);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        // Fresh flag per connection so a stale reader cannot flip the new one.
        let connected = Arc::new(AtomicBool::new(true));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        self.tasks.push(tokio::spawn(read_frames(
            read_half,
            in_tx,
            self.max_frame_len,
            Arc::clone(&connected),
        )));
        self.tasks.push(tokio::spawn(write_frames(
            write_half,
            out_rx,
            Arc::clone(&connected),
        )));
        self.connected = connected;
        self.inbound = Some(in_rx);
        self.outbound = Some(out_tx);

        info!(host = %endpoint.host, port = endpoint.port, client_id = endpoint.client_id, "Connected to upstream bridge");
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.is_connected() || !self.tasks.is_empty() {
            info!("Disconnecting from upstream bridge");
        }
        self.teardown();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&mut self, request: &OutboundRequest) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Transport("not connected".into()));
        }
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| SessionError::Transport("not connected".into()))?;
        let mut line =
            serde_json::to_vec(request).map_err(|e| SessionError::Transport(e.to_string()))?;
        line.push(b'\n');
        tx.send(line)
            .map_err(|_| SessionError::Transport("writer stopped".into()))
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.as_mut()?.try_recv().ok()
    }
}

impl Drop for JsonLineTransport {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn read_frames(
    read_half: OwnedReadHalf,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    max_frame_len: usize,
    connected: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(read_half);
    loop {
        let mut frame = Vec::new();
        // One byte past the limit is enough for the pump to reject the frame.
        let limit = max_frame_len as u64 + 1;
        match (&mut reader).take(limit).read_until(b'\n', &mut frame).await {
            Ok(0) => {
                info!("Upstream bridge closed the connection");
                break;
            }
            Ok(_) => {
                let complete = frame.last() == Some(&b'\n');
                if complete {
                    frame.pop();
                    if frame.last() == Some(&b'\r') {
                        frame.pop();
                    }
                    if frame.is_empty() {
                        continue;
                    }
                }
                let oversized = !complete && frame.len() > max_frame_len;
                if tx.send(frame).is_err() {
                    break;
                }
                if oversized {
                    // Framing is lost after an oversized frame.
                    warn!(max_frame_len, "Oversized inbound frame, stopping reader");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Upstream read failed");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

async fn write_frames(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_half.write_all(&line).await {
            warn!(error = %e, "Upstream write failed");
            break;
        }
        debug!(bytes = line.len(), "Request written");
    }
    let _ = write_half.shutdown().await;
    connected.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint {
            host: "127.0.0.1".into(),
            port,
            client_id: 7,
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_request_serialization() {
        let request = OutboundRequest::CancelOrder {
            order_id: RequestId::new(12),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"request":"cancel_order","order_id":12}"#);
        assert_eq!(request.req_id(), Some(RequestId::new(12)));
        assert_eq!(OutboundRequest::CurrentTime.req_id(), None);
    }

    #[test]
    fn test_json_decoder_errors_are_decode() {
        let err = JsonDecoder.decode(b"{not json").unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
    }

    #[test]
    fn test_send_while_disconnected_fails() {
        let mut transport = JsonLineTransport::new(1024);
        assert!(!transport.is_connected());
        assert!(transport.send(&OutboundRequest::CurrentTime).is_err());
        assert!(transport.try_recv().is_none());
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_line_exchange_with_bridge() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let bridge = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let first = lines.next_line().await.unwrap().unwrap();
            write_half
                .write_all(b"{\"event\":\"current_time\",\"time\":1596173490}\n")
                .await
                .unwrap();
            first
        });

        let mut transport = JsonLineTransport::new(1024);
        transport.connect(&endpoint(port)).await.unwrap();
        assert!(transport.is_connected());
        transport.send(&OutboundRequest::CurrentTime).unwrap();

        let received = bridge.await.unwrap();
        assert_eq!(received, r#"{"request":"current_time"}"#);

        let mut frame = None;
        for _ in 0..50 {
            if let Some(f) = transport.try_recv() {
                frame = Some(f);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let event = JsonDecoder.decode(&frame.unwrap()).unwrap();
        assert_eq!(event, InboundEvent::CurrentTime { time: 1596173490 });
    }

    #[tokio::test]
    async fn test_oversized_frame_forwarded_then_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[b'x'; 64]).await.unwrap();
            socket.write_all(b"\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = JsonLineTransport::new(16);
        transport.connect(&endpoint(port)).await.unwrap();

        let mut frame = None;
        for _ in 0..50 {
            if let Some(f) = transport.try_recv() {
                frame = Some(f);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(frame.unwrap().len(), 17);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!transport.is_connected());
    }
}

//! Shared doubles for session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use session::events::InboundEvent;
use session::transport::{Endpoint, OutboundRequest, Transport};
use session::watchdog::{ProcessControl, ProcessScan};
use session::SessionError;

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    connects: usize,
    sent: Vec<OutboundRequest>,
    inbound: VecDeque<Vec<u8>>,
}

/// In-memory transport; clones share one link.
#[derive(Debug, Clone, Default)]
pub struct Loopback {
    state: Arc<Mutex<LinkState>>,
}

impl Loopback {
    pub fn push_event(&self, event: &InboundEvent) {
        let frame = serde_json::to_vec(event).unwrap();
        self.push_raw(frame);
    }

    pub fn push_raw(&self, frame: Vec<u8>) {
        self.state.lock().unwrap().inbound.push_back(frame);
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Simulate the peer dropping the connection.
    pub fn drop_link(&self) {
        self.state.lock().unwrap().connected = false;
    }
}

#[async_trait]
impl Transport for Loopback {
    async fn connect(&mut self, _endpoint: &Endpoint) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn send(&mut self, request: &OutboundRequest) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(SessionError::Transport("not connected".into()));
        }
        state.sent.push(request.clone());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().inbound.pop_front()
    }
}

/// Transport whose handshake never completes.
#[derive(Debug, Default)]
pub struct Stalled;

#[async_trait]
impl Transport for Stalled {
    async fn connect(&mut self, _endpoint: &Endpoint) -> Result<(), SessionError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        false
    }

    fn send(&mut self, _request: &OutboundRequest) -> Result<(), SessionError> {
        Err(SessionError::Transport("not connected".into()))
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        None
    }
}

#[derive(Debug, Default)]
struct ControlLog {
    scans: VecDeque<Vec<u32>>,
    fallback: Vec<u32>,
    kills: Vec<Vec<u32>>,
    launches: usize,
}

/// Process control that replays scripted scans and records the rest.
#[derive(Debug, Clone, Default)]
pub struct ScriptedControl {
    log: Arc<Mutex<ControlLog>>,
}

impl ScriptedControl {
    /// Scans return `script` in order, then `fallback` forever.
    pub fn new(script: Vec<Vec<u32>>, fallback: Vec<u32>) -> Self {
        let log = ControlLog {
            scans: script.into(),
            fallback,
            ..ControlLog::default()
        };
        Self {
            log: Arc::new(Mutex::new(log)),
        }
    }

    pub fn kills(&self) -> Vec<Vec<u32>> {
        self.log.lock().unwrap().kills.clone()
    }

    pub fn launches(&self) -> usize {
        self.log.lock().unwrap().launches
    }
}

impl ProcessControl for ScriptedControl {
    fn scan(&self) -> Result<ProcessScan, SessionError> {
        let mut log = self.log.lock().unwrap();
        let pids = log.scans.pop_front().unwrap_or_else(|| log.fallback.clone());
        Ok(ProcessScan::new(pids))
    }

    fn launch(&self) -> Result<(), SessionError> {
        self.log.lock().unwrap().launches += 1;
        Ok(())
    }

    fn kill(&self, pids: &[u32]) -> Result<(), SessionError> {
        self.log.lock().unwrap().kills.push(pids.to_vec());
        Ok(())
    }
}

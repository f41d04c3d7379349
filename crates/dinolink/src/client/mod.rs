mod config;
mod worker;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::ClientError;
use crate::lobby::{LobbySnapshot, sanitize_name};
use crate::net::{
    self, ClientMessage, ConnectionState, Endpoint, NetworkStats, PlayerState, ResultDirective,
    RivalSnapshot, SessionState, StartDirective,
};

pub use config::ClientConfig;

use worker::{KEEPALIVE_THREAD, KeepAliveLoop, RECEIVE_THREAD, ReceiveLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(SocketAddr),
    NotFound,
}

enum KeepAlive {
    NotStarted,
    Running {
        stop: Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Client side of one match session.
///
/// Owns the socket plus the receive and keepalive threads. Every getter hands
/// out a copy; every sender is fire-and-forget. Dropping the client
/// disconnects it.
pub struct NetClient {
    config: ClientConfig,
    endpoint: Arc<Endpoint>,
    state: Arc<SessionState>,
    running: Arc<AtomicBool>,
    inbox: Receiver<String>,
    receiver: Mutex<Option<JoinHandle<()>>>,
    keepalive: Mutex<KeepAlive>,
}

impl NetClient {
    /// Binds the socket and starts the receive loop.
    pub fn start(config: ClientConfig) -> Result<Self, ClientError> {
        let endpoint = Endpoint::bind(config.bind_addr, config.receive_timeout)
            .map_err(ClientError::Socket)?;
        let endpoint = Arc::new(endpoint);
        let state = Arc::new(SessionState::new());
        let running = Arc::new(AtomicBool::new(true));
        let (inbox_tx, inbox_rx) = crossbeam_channel::unbounded();

        let receiver = ReceiveLoop {
            endpoint: Arc::clone(&endpoint),
            state: Arc::clone(&state),
            inbox: inbox_tx,
            running: Arc::clone(&running),
        }
        .spawn()
        .map_err(|source| ClientError::Spawn {
            name: RECEIVE_THREAD,
            source,
        })?;

        log::info!("Client socket bound to {}", endpoint.local_addr());

        Ok(Self {
            config,
            endpoint,
            state,
            running,
            inbox: inbox_rx,
            receiver: Mutex::new(Some(receiver)),
            keepalive: Mutex::new(KeepAlive::NotStarted),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Fixes the server address explicitly.
    pub fn set_server(&self, host: &str, port: u16) -> Result<SocketAddr, ClientError> {
        let local = self.endpoint.local_addr();
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| ClientError::InvalidHost {
                host: host.to_string(),
                source,
            })?
            .find(|addr| addr.is_ipv4() == local.is_ipv4())
            .ok_or_else(|| ClientError::UnresolvedHost(host.to_string()))?;

        self.state
            .fix_peer(addr)
            .map_err(ClientError::ServerAlreadySet)
    }

    /// Broadcasts DISCOVER on every interface until a server answers or
    /// `timeout` elapses, then connects. Not finding a server is an outcome,
    /// not an error.
    pub fn discover_and_connect(
        &self,
        name: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<DiscoveryOutcome, ClientError> {
        self.ensure_running()?;

        let deadline = Instant::now() + timeout;
        self.state.begin_discovery(port);

        while self.is_running() && self.state.peer().is_none() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            for target in net::broadcast_targets() {
                let addr = SocketAddr::new(target, port);
                log::debug!("DISCOVER -> {}", addr);
                self.endpoint.send_message(&ClientMessage::Discover, addr);
            }

            thread::sleep(self.config.discovery_retry.min(deadline - now));
        }

        self.state.end_discovery();

        match self.state.peer() {
            Some(addr) => {
                self.connect(name)?;
                Ok(DiscoveryOutcome::Found(addr))
            }
            None => {
                log::info!(
                    "No server answered discovery on port {} within {:?}",
                    port,
                    timeout
                );
                Ok(DiscoveryOutcome::NotFound)
            }
        }
    }

    /// Discovery with the configured port and timeout.
    pub fn discover(&self, name: &str) -> Result<DiscoveryOutcome, ClientError> {
        self.discover_and_connect(name, self.config.server_port, self.config.discovery_timeout)
    }

    /// Sends CONNECT to the known server and starts the keepalive loop.
    pub fn connect(&self, name: &str) -> Result<(), ClientError> {
        self.ensure_running()?;
        let server = self.state.peer().ok_or(ClientError::NoServer)?;

        let name = sanitize_name(name);
        self.state.begin_handshake();
        log::info!("Connecting to {} as {}", server, name);
        self.send(&ClientMessage::Connect { name });

        self.start_keepalive()
    }

    pub fn set_ready(&self, ready: bool) {
        self.send(&ClientMessage::Ready { ready });
    }

    pub fn report_death(&self, score: u32, elapsed_secs: u32) {
        self.send(&ClientMessage::Dead {
            score,
            time_secs: elapsed_secs,
        });
    }

    pub fn send_player_state(&self, state: PlayerState) {
        self.send(&ClientMessage::State(state));
    }

    /// Start directive, handed out once.
    pub fn consume_start(&self) -> Option<StartDirective> {
        self.state.take_start()
    }

    /// Result directive, handed out once.
    pub fn consume_result(&self) -> Option<ResultDirective> {
        self.state.take_result()
    }

    pub fn latest_rival_state(&self) -> Option<RivalSnapshot> {
        self.state.rival()
    }

    pub fn lobby_snapshot(&self) -> LobbySnapshot {
        self.state.lobby()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// 0 until the server has welcomed us.
    pub fn session_id(&self) -> u32 {
        self.state.session_id()
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.state.peer()
    }

    pub fn stats(&self) -> NetworkStats {
        self.endpoint.stats()
    }

    /// Oldest raw message not yet drained.
    pub fn poll_raw(&self) -> Option<String> {
        self.inbox.try_recv().ok()
    }

    pub fn drain_raw(&self) -> Vec<String> {
        self.inbox.try_iter().collect()
    }

    /// Sends DISCONNECT, stops both loops and releases the socket. Later calls
    /// do nothing.
    pub fn disconnect(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(server) = self.state.peer() {
            self.endpoint.send_message(&ClientMessage::Disconnect, server);
        }

        let keepalive = std::mem::replace(&mut *self.keepalive.lock(), KeepAlive::Stopped);
        if let KeepAlive::Running { stop, handle } = keepalive {
            drop(stop);
            if handle.join().is_err() {
                log::warn!("Keepalive thread panicked");
            }
        }

        self.endpoint.close();

        let receiver = self.receiver.lock().take();
        if let Some(handle) = receiver {
            if handle.join().is_err() {
                log::warn!("Receive thread panicked");
            }
        }

        self.state.reset();
        log::info!("Disconnected");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ClientError::Closed)
        }
    }

    fn send(&self, message: &ClientMessage) {
        if !self.is_running() {
            return;
        }
        match self.state.peer() {
            Some(server) => {
                self.endpoint.send_message(message, server);
            }
            None => log::trace!("No server yet, dropping {}", message.verb()),
        }
    }

    fn start_keepalive(&self) -> Result<(), ClientError> {
        let mut keepalive = self.keepalive.lock();
        if !matches!(*keepalive, KeepAlive::NotStarted) {
            return Ok(());
        }

        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let handle = KeepAliveLoop {
            endpoint: Arc::clone(&self.endpoint),
            state: Arc::clone(&self.state),
            interval: self.config.ping_interval,
            stop: stop_rx,
        }
        .spawn()
        .map_err(|source| ClientError::Spawn {
            name: KEEPALIVE_THREAD,
            source,
        })?;

        *keepalive = KeepAlive::Running { stop, handle };
        Ok(())
    }
}

impl Drop for NetClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

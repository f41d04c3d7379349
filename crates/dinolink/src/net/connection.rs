use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};

use crate::lobby::LobbySnapshot;

use super::protocol::ServerMessage;
use super::snapshot::{ResultDirective, RivalSnapshot, StartDirective};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Lobby,
    InMatch,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Discovering,
    AwaitingWelcome,
    Connected(MatchPhase),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }
}

#[derive(Debug)]
struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T: Clone> SnapshotCell<T> {
    fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    fn load(&self) -> T {
        let current = Arc::clone(&self.current.read());
        T::clone(&current)
    }

    fn store(&self, value: T) {
        *self.current.write() = Arc::new(value);
    }
}

#[derive(Debug)]
struct PendingCell<T> {
    slot: Mutex<Option<T>>,
}

impl<T> PendingCell<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn put(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }
}

/// Session state shared between the receive loop (writer) and the consumer
/// (reader). Each field is guarded on its own; no method holds two guards at
/// once.
#[derive(Debug)]
pub struct SessionState {
    state: Mutex<ConnectionState>,
    peer: OnceLock<SocketAddr>,
    discovery_port: AtomicU16,
    session_id: AtomicU32,
    lobby: SnapshotCell<LobbySnapshot>,
    rival: SnapshotCell<Option<RivalSnapshot>>,
    pending_start: PendingCell<StartDirective>,
    pending_result: PendingCell<ResultDirective>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Idle),
            peer: OnceLock::new(),
            discovery_port: AtomicU16::new(0),
            session_id: AtomicU32::new(0),
            lobby: SnapshotCell::new(LobbySnapshot::default()),
            rival: SnapshotCell::new(None),
            pending_start: PendingCell::new(),
            pending_result: PendingCell::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer.get().copied()
    }

    /// Fixes the server address. Once fixed it never changes; a different
    /// address is rejected with the one already in place.
    pub fn fix_peer(&self, addr: SocketAddr) -> Result<SocketAddr, SocketAddr> {
        let fixed = *self.peer.get_or_init(|| addr);
        if fixed == addr { Ok(fixed) } else { Err(fixed) }
    }

    pub fn session_id(&self) -> u32 {
        self.session_id.load(Ordering::SeqCst)
    }

    /// HERE answers received while discovering fix the peer to the sender's
    /// IP on `port`.
    pub fn begin_discovery(&self, port: u16) -> bool {
        let mut state = self.state.lock();
        if *state == ConnectionState::Idle {
            self.discovery_port.store(port, Ordering::SeqCst);
            *state = ConnectionState::Discovering;
            true
        } else {
            false
        }
    }

    pub fn end_discovery(&self) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Discovering {
            *state = ConnectionState::Idle;
        }
    }

    pub fn begin_handshake(&self) -> ConnectionState {
        let mut state = self.state.lock();
        let previous = *state;
        if matches!(previous, ConnectionState::Idle | ConnectionState::Discovering) {
            *state = ConnectionState::AwaitingWelcome;
        }
        previous
    }

    pub fn reset(&self) {
        *self.state.lock() = ConnectionState::Idle;
    }

    pub fn lobby(&self) -> LobbySnapshot {
        self.lobby.load()
    }

    pub fn rival(&self) -> Option<RivalSnapshot> {
        self.rival.load()
    }

    pub fn take_start(&self) -> Option<StartDirective> {
        self.pending_start.take()
    }

    pub fn take_result(&self) -> Option<ResultDirective> {
        self.pending_result.take()
    }

    /// Applies one decoded server message. Returns `false` when the message
    /// is not meaningful in the current state and was ignored.
    pub fn apply(&self, message: ServerMessage, from: SocketAddr) -> bool {
        match message {
            ServerMessage::Here => self.on_here(from),
            ServerMessage::Welcome { id } => self.on_welcome(id),
            ServerMessage::Pong => self.state().is_connected(),
            message => {
                if !self.state().is_connected() {
                    log::debug!("Ignoring {} before WELCOME", message.verb());
                    return false;
                }
                self.on_session_message(message);
                true
            }
        }
    }

    fn on_here(&self, from: SocketAddr) -> bool {
        if self.state() != ConnectionState::Discovering {
            log::debug!("Ignoring unsolicited HERE from {}", from);
            return false;
        }

        let addr = SocketAddr::new(from.ip(), self.discovery_port.load(Ordering::SeqCst));
        match self.fix_peer(addr) {
            Ok(addr) => {
                log::info!("Server at {} answered discovery", addr);
                true
            }
            Err(fixed) => {
                log::debug!("Ignoring HERE from {}, server already fixed to {}", from, fixed);
                false
            }
        }
    }

    fn on_welcome(&self, id: u32) -> bool {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::AwaitingWelcome => {
                let assigned = self
                    .session_id
                    .compare_exchange(0, id, Ordering::SeqCst, Ordering::SeqCst);
                if let Err(current) = assigned {
                    log::debug!("WELCOME (id={}) after id {} was assigned", id, current);
                    return false;
                }
                *state = ConnectionState::Connected(MatchPhase::Lobby);
                log::info!("Joined session as player {}", id);
                true
            }
            ConnectionState::Connected(_) => {
                log::debug!("Duplicate WELCOME (id={}) ignored", id);
                false
            }
            other => {
                log::debug!("WELCOME while {:?} ignored", other);
                false
            }
        }
    }

    fn on_session_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::Lobby(lobby) => {
                self.lobby.store(lobby);
                self.transition_phase(MatchPhase::Finished, MatchPhase::Lobby);
            }
            ServerMessage::Start(start) => {
                log::info!(
                    "Match start: seed={} t0={} speed={}",
                    start.seed,
                    start.t0_ms,
                    start.speed
                );
                self.pending_start.put(start);
                self.set_phase(MatchPhase::InMatch);
            }
            ServerMessage::RivalState(rival) => {
                self.rival.store(Some(rival));
            }
            ServerMessage::Result(result) => {
                log::info!(
                    "Match result: winner={} reason={}",
                    result.winner,
                    result.reason.as_deref().unwrap_or("-")
                );
                self.pending_result.put(result);
                self.set_phase(MatchPhase::Finished);
            }
            ServerMessage::Here | ServerMessage::Welcome { .. } | ServerMessage::Pong => {}
        }
    }

    fn set_phase(&self, phase: MatchPhase) {
        let mut state = self.state.lock();
        if state.is_connected() {
            *state = ConnectionState::Connected(phase);
        }
    }

    fn transition_phase(&self, from: MatchPhase, to: MatchPhase) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Connected(from) {
            *state = ConnectionState::Connected(to);
        }
    }
}

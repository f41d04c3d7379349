use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::net::{ClientMessage, Datagram, Endpoint, RecvError, ServerMessage, SessionState};

pub(crate) const RECEIVE_THREAD: &str = "dinolink-recv";
pub(crate) const KEEPALIVE_THREAD: &str = "dinolink-ping";

/// Records every datagram in the raw inbox, then feeds it to the session
/// state. Runs until the run flag clears or the endpoint closes.
pub(crate) struct ReceiveLoop {
    pub endpoint: Arc<Endpoint>,
    pub state: Arc<SessionState>,
    pub inbox: Sender<String>,
    pub running: Arc<AtomicBool>,
}

impl ReceiveLoop {
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(RECEIVE_THREAD.to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        log::debug!("Receive loop started on {}", self.endpoint.local_addr());

        while self.running.load(Ordering::SeqCst) {
            match self.endpoint.receive() {
                Ok(datagram) => self.handle(datagram),
                Err(RecvError::Timeout) => continue,
                Err(RecvError::Closed) => break,
                Err(RecvError::Io(e)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    log::warn!("Receive error: {}", e);
                }
            }
        }

        log::debug!("Receive loop stopped");
    }

    fn handle(&self, datagram: Datagram) {
        let text = datagram.text().trim().to_string();
        let message = ServerMessage::decode(&text);

        // Only fails once every receiver is gone, i.e. nobody is reading.
        if self.inbox.send(text).is_err() {
            log::trace!("Raw inbox has no reader");
        }

        match message {
            Some(message) => {
                self.state.apply(message, datagram.from);
            }
            None => log::trace!("Unrecognized datagram from {}", datagram.from),
        }
    }
}

/// Sends PING at a fixed interval while a server address is known. Stops
/// when its stop channel receives a message or is dropped.
pub(crate) struct KeepAliveLoop {
    pub endpoint: Arc<Endpoint>,
    pub state: Arc<SessionState>,
    pub interval: Duration,
    pub stop: Receiver<()>,
}

impl KeepAliveLoop {
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(KEEPALIVE_THREAD.to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        loop {
            match self.stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(peer) = self.state.peer() {
                        self.endpoint.send_message(&ClientMessage::Ping, peer);
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        log::debug!("Keepalive loop stopped");
    }
}

use std::borrow::Cow;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use parking_lot::RwLock;

use super::protocol::{ClientMessage, MAX_PACKET_SIZE};
use super::stats::{NetworkStats, StatsCounters};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub data: Vec<u8>,
    pub from: SocketAddr,
}

impl Datagram {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    #[error("receive timed out")]
    Timeout,
    #[error("endpoint closed")]
    Closed,
    #[error("receive failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct Endpoint {
    socket: RwLock<Option<UdpSocket>>,
    local_addr: SocketAddr,
    stats: StatsCounters,
}

impl Endpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A, receive_timeout: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(receive_timeout))?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket: RwLock::new(Some(socket)),
            local_addr,
            stats: StatsCounters::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats.snapshot()
    }

    /// Best effort. Returns whether the datagram left the socket.
    pub fn send(&self, data: &[u8], addr: SocketAddr) -> bool {
        let socket = self.socket.read();
        let Some(socket) = socket.as_ref() else {
            return false;
        };

        if data.len() > MAX_PACKET_SIZE {
            log::debug!("Dropping {} byte datagram to {}: exceeds MTU", data.len(), addr);
            self.stats.record_send_failure();
            return false;
        }

        match socket.send_to(data, addr) {
            Ok(bytes) => {
                self.stats.record_sent(bytes);
                true
            }
            Err(e) => {
                log::trace!("Send to {} failed: {}", addr, e);
                self.stats.record_send_failure();
                false
            }
        }
    }

    pub fn send_message(&self, message: &ClientMessage, addr: SocketAddr) -> bool {
        self.send(message.encode().as_bytes(), addr)
    }

    pub fn receive(&self) -> Result<Datagram, RecvError> {
        let socket = self.socket.read();
        let Some(socket) = socket.as_ref() else {
            return Err(RecvError::Closed);
        };

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        match socket.recv_from(&mut buffer) {
            Ok((size, from)) => {
                self.stats.record_received(size);
                Ok(Datagram {
                    data: buffer[..size].to_vec(),
                    from,
                })
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Err(RecvError::Timeout)
            }
            Err(e) => Err(RecvError::Io(e)),
        }
    }

    /// Drops the socket, releasing its port. Waits for an in-flight receive,
    /// so this blocks for at most one receive timeout.
    pub fn close(&self) {
        if self.socket.write().take().is_some() {
            log::debug!("Closed socket {}", self.local_addr);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.socket.read().is_none()
    }
}

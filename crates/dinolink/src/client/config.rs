use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::net::DEFAULT_PORT;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub bind_addr: SocketAddr,
    pub server_port: u16,
    /// Upper bound on one blocking receive; also how quickly the receive loop
    /// notices a stop request.
    pub receive_timeout: Duration,
    pub ping_interval: Duration,
    pub discovery_retry: Duration,
    pub discovery_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            server_port: DEFAULT_PORT,
            receive_timeout: Duration::from_millis(500),
            ping_interval: Duration::from_millis(1200),
            discovery_retry: Duration::from_millis(250),
            discovery_timeout: Duration::from_millis(3000),
        }
    }
}

mod connection;
mod endpoint;
mod interfaces;
mod protocol;
mod snapshot;
mod stats;

pub use connection::{ConnectionState, MatchPhase, SessionState};
pub use endpoint::{Datagram, Endpoint, RecvError};
pub use interfaces::broadcast_targets;
pub use protocol::{
    ClientMessage, DEFAULT_HP, DEFAULT_PORT, DEFAULT_SPEED, Fields, MAX_PACKET_SIZE,
    ServerMessage,
};
pub use snapshot::{PlayerState, ResultDirective, RivalSnapshot, StartDirective, unix_millis};
pub use stats::NetworkStats;

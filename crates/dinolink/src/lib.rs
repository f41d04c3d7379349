pub mod client;
pub mod error;
pub mod lobby;
pub mod net;

pub use client::{ClientConfig, DiscoveryOutcome, NetClient};
pub use error::ClientError;
pub use lobby::{LobbySlot, LobbySnapshot, sanitize_name};
pub use net::{
    ClientMessage, ConnectionState, DEFAULT_PORT, Endpoint, MatchPhase, NetworkStats,
    PlayerState, ResultDirective, RivalSnapshot, ServerMessage, SessionState, StartDirective,
};

use std::io;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid server host `{host}`: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("server host `{0}` has no address usable from this socket")]
    UnresolvedHost(String),
    #[error("server address already fixed to {0}")]
    ServerAlreadySet(SocketAddr),
    #[error("no server address known")]
    NoServer,
    #[error("failed to open socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("session closed")]
    Closed,
}

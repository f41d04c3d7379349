use std::str::FromStr;

use crate::lobby::{LobbySlot, LobbySnapshot};

use super::snapshot::{PlayerState, ResultDirective, RivalSnapshot, StartDirective};

pub const MAX_PACKET_SIZE: usize = 1600;
pub const DEFAULT_PORT: u16 = 4321;
pub const DEFAULT_HP: i32 = 10;
pub const DEFAULT_SPEED: f32 = 220.0;

const PAIR_SEPARATOR: char = ';';
const KEY_SEPARATOR: char = '=';

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Discover,
    Connect { name: String },
    Ready { ready: bool },
    State(PlayerState),
    Dead { score: u32, time_secs: u32 },
    Ping,
    Disconnect,
}

impl ClientMessage {
    pub fn verb(&self) -> &'static str {
        match self {
            ClientMessage::Discover => "DISCOVER",
            ClientMessage::Connect { .. } => "CONNECT",
            ClientMessage::Ready { .. } => "READY",
            ClientMessage::State(_) => "STATE",
            ClientMessage::Dead { .. } => "DEAD",
            ClientMessage::Ping => "PING",
            ClientMessage::Disconnect => "DISCONNECT",
        }
    }

    pub fn encode(&self) -> String {
        let verb = self.verb();
        match self {
            ClientMessage::Discover | ClientMessage::Ping | ClientMessage::Disconnect => {
                verb.to_string()
            }
            ClientMessage::Connect { name } => format!("{verb} name={name}"),
            ClientMessage::Ready { ready } => format!("{verb} v={}", bit(*ready)),
            ClientMessage::State(state) => format!(
                "{verb} y={};g={};s={};hp={};score={}",
                state.y,
                bit(state.on_ground),
                bit(state.sliding),
                state.hp,
                state.score
            ),
            ClientMessage::Dead { score, time_secs } => {
                format!("{verb} score={score};time={time_secs}")
            }
        }
    }
}

/// Messages received from the match server. Decoding never fails on a known
/// verb: absent or garbled fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Here,
    Welcome { id: u32 },
    Lobby(LobbySnapshot),
    Start(StartDirective),
    RivalState(RivalSnapshot),
    Result(ResultDirective),
    Pong,
}

impl ServerMessage {
    /// Returns `None` for an unrecognized verb.
    pub fn decode(text: &str) -> Option<Self> {
        let (verb, payload) = split_verb(text);
        let fields = Fields::parse(payload);

        let message = match verb {
            "HERE" => ServerMessage::Here,
            "WELCOME" => ServerMessage::Welcome {
                id: fields.parse_or("id", 0),
            },
            "LOBBY" => ServerMessage::Lobby(LobbySnapshot {
                players: fields.parse_or("players", 0),
                p1: fields.get("p1").and_then(LobbySlot::parse).unwrap_or_default(),
                p2: fields.get("p2").and_then(LobbySlot::parse).unwrap_or_default(),
            }),
            "START" => ServerMessage::Start(StartDirective {
                seed: fields.parse_or("seed", 0),
                t0_ms: fields.parse_or("t0", 0),
                speed: fields.parse_or("speed", DEFAULT_SPEED),
            }),
            "RIVAL_STATE" | "STATE" => ServerMessage::RivalState(RivalSnapshot {
                id: fields.parse_or("id", 0),
                y: fields.parse_or("y", 0.0),
                on_ground: fields.flag("g"),
                sliding: fields.flag("s"),
                hp: fields.parse_or("hp", DEFAULT_HP),
                score: fields.parse_or("score", 0),
            }),
            "RESULT" => ServerMessage::Result(ResultDirective {
                winner: fields.parse_or("winner", 0),
                reason: fields.get("reason").map(str::to_string),
            }),
            "PONG" => ServerMessage::Pong,
            _ => return None,
        };

        Some(message)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ServerMessage::Here => "HERE",
            ServerMessage::Welcome { .. } => "WELCOME",
            ServerMessage::Lobby(_) => "LOBBY",
            ServerMessage::Start(_) => "START",
            ServerMessage::RivalState(_) => "RIVAL_STATE",
            ServerMessage::Result(_) => "RESULT",
            ServerMessage::Pong => "PONG",
        }
    }
}

fn split_verb(text: &str) -> (&str, &str) {
    let text = text.trim();
    text.split_once(' ').unwrap_or((text, ""))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pairs: Vec<(String, String)>,
}

impl Fields {
    /// Malformed pairs (no `=`, more than one `=`, empty value) are skipped.
    pub fn parse(payload: &str) -> Self {
        let compact: String = payload.chars().filter(|c| *c != ' ').collect();

        let pairs = compact
            .split(PAIR_SEPARATOR)
            .filter_map(|part| {
                let mut pieces = part.split(KEY_SEPARATOR);
                match (pieces.next(), pieces.next(), pieces.next()) {
                    (Some(key), Some(value), None) if !value.is_empty() => {
                        Some((key.to_string(), value.to_string()))
                    }
                    _ => None,
                }
            })
            .collect();

        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }
}

fn bit(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

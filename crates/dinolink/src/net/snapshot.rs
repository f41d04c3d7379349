use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerState {
    pub y: f32,
    pub on_ground: bool,
    pub sliding: bool,
    pub hp: i32,
    pub score: u32,
}

/// Latest relayed state of the remote player. Last write wins: there is no
/// sequence number, so a reordered datagram can briefly apply an older value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RivalSnapshot {
    pub id: u32,
    pub y: f32,
    pub on_ground: bool,
    pub sliding: bool,
    pub hp: i32,
    pub score: u32,
}

impl RivalSnapshot {
    pub fn state(&self) -> PlayerState {
        PlayerState {
            y: self.y,
            on_ground: self.on_ground,
            sliding: self.sliding,
            hp: self.hp,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartDirective {
    pub seed: i64,
    pub t0_ms: i64,
    pub speed: f32,
}

impl StartDirective {
    /// Negative once the start time has passed.
    pub fn millis_until_start(&self, now_ms: i64) -> i64 {
        self.t0_ms - now_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDirective {
    /// 0 means draw or no winner.
    pub winner: u32,
    pub reason: Option<String>,
}

impl ResultDirective {
    pub fn is_draw(&self) -> bool {
        self.winner == 0
    }

    pub fn is_winner(&self, session_id: u32) -> bool {
        session_id != 0 && self.winner == session_id
    }
}

pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

use std::thread;
use std::time::{Duration, Instant};

use dinolink::net::unix_millis;
use dinolink::{
    LobbySlot, LobbySnapshot, NetClient, PlayerState, ResultDirective, RivalSnapshot,
    StartDirective,
};

const SCORE_PER_SECOND: f32 = 10.0;
const STARTING_HP: i32 = 10;

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub ready: bool,
    pub print_raw: bool,
    pub tick: Duration,
    pub die_after: Option<Duration>,
}

/// Polls the client once per tick the way a game screen would: lobby first,
/// then the match, until a result arrives.
pub struct Runner<'a> {
    client: &'a NetClient,
    options: RunnerOptions,
    ready_sent: bool,
    lobby: LobbySnapshot,
    rival: Option<RivalSnapshot>,
    start: Option<StartDirective>,
    started_at: Option<Instant>,
    dead: bool,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a NetClient, options: RunnerOptions) -> Self {
        Self {
            client,
            options,
            ready_sent: false,
            lobby: LobbySnapshot::default(),
            rival: None,
            start: None,
            started_at: None,
            dead: false,
        }
    }

    pub fn run(mut self) -> ResultDirective {
        loop {
            if let Some(result) = self.tick() {
                return result;
            }
            thread::sleep(self.options.tick);
        }
    }

    fn tick(&mut self) -> Option<ResultDirective> {
        if self.options.print_raw {
            for line in self.client.drain_raw() {
                println!("<< {}", line);
            }
        }

        if let Some(result) = self.client.consume_result() {
            return Some(result);
        }

        if self.options.ready && !self.ready_sent && self.client.is_connected() {
            self.client.set_ready(true);
            self.ready_sent = true;
        }

        self.poll_lobby();

        if let Some(start) = self.client.consume_start() {
            log::info!(
                "Match starts in {} ms (seed {}, speed {})",
                start.millis_until_start(unix_millis()).max(0),
                start.seed,
                start.speed
            );
            self.start = Some(start);
        }

        self.play();
        None
    }

    fn poll_lobby(&mut self) {
        let lobby = self.client.lobby_snapshot();
        if lobby != self.lobby {
            log::info!(
                "Lobby ({} players): P1 {} | P2 {}",
                lobby.players,
                describe(&lobby.p1),
                describe(&lobby.p2)
            );
            if lobby.all_ready() {
                log::info!("Both players ready, waiting for START");
            }
            self.lobby = lobby;
        }
    }

    fn play(&mut self) {
        let Some(start) = self.start else {
            return;
        };

        if self.started_at.is_none() {
            if start.millis_until_start(unix_millis()) > 0 {
                return;
            }
            log::info!("Running");
            self.started_at = Some(Instant::now());
        }

        let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let score = (elapsed.as_secs_f32() * SCORE_PER_SECOND) as u32;

        if let Some(rival) = self.client.latest_rival_state() {
            if self.rival != Some(rival) {
                log::debug!("Rival y={} hp={} score={}", rival.y, rival.hp, rival.score);
                self.rival = Some(rival);
            }
        }

        if self.dead {
            return;
        }

        if self.options.die_after.is_some_and(|limit| elapsed >= limit) {
            log::info!("Reporting death at score {}", score);
            self.client.report_death(score, elapsed.as_secs() as u32);
            self.dead = true;
            return;
        }

        self.client.send_player_state(PlayerState {
            y: 0.0,
            on_ground: true,
            sliding: false,
            hp: STARTING_HP,
            score,
        });
    }
}

fn describe(slot: &LobbySlot) -> String {
    match &slot.name {
        Some(name) if slot.ready => format!("{} (ready)", name),
        Some(name) => name.clone(),
        None => "-".to_string(),
    }
}

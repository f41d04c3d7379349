use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use dinolink::net::unix_millis;
use dinolink::{
    ClientConfig, ConnectionState, DiscoveryOutcome, MatchPhase, NetClient, PlayerState,
};

struct FakeServer {
    socket: UdpSocket,
}

impl FakeServer {
    fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(1000)))
            .unwrap();
        Self { socket }
    }

    fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    fn send(&self, text: &str, to: SocketAddr) {
        self.socket.send_to(text.as_bytes(), to).unwrap();
    }

    /// Next message other than PING or DISCOVER, or `None` once the read
    /// timeout expires.
    fn recv(&self) -> Option<(String, SocketAddr)> {
        let mut buffer = [0u8; 1600];
        loop {
            let (size, from) = self.socket.recv_from(&mut buffer).ok()?;
            let text = String::from_utf8_lossy(&buffer[..size]).into_owned();
            if text != "PING" && text != "DISCOVER" {
                return Some((text, from));
            }
        }
    }

    fn recv_ping(&self) -> Option<SocketAddr> {
        let mut buffer = [0u8; 1600];
        loop {
            let (size, from) = self.socket.recv_from(&mut buffer).ok()?;
            if &buffer[..size] == b"PING" {
                return Some(from);
            }
        }
    }
}

fn test_config() -> ClientConfig {
    ClientConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        receive_timeout: Duration::from_millis(100),
        ping_interval: Duration::from_secs(60),
        ..Default::default()
    }
}

fn wait_for<T>(timeout_ms: u64, mut poll: impl FnMut() -> Option<T>) -> Option<T> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if let Some(value) = poll() {
            return Some(value);
        }
        thread::sleep(Duration::from_millis(2));
    }
    None
}

fn wait_for_raw(client: &NetClient, count: usize) -> Vec<String> {
    let mut seen = Vec::new();
    wait_for(2000, || {
        seen.extend(client.drain_raw());
        (seen.len() >= count).then_some(())
    })
    .unwrap_or_else(|| panic!("Expected {} raw messages, got {:?}", count, seen));
    seen
}

/// Waits for `count` raw messages. A trailing PONG is sent and waited for
/// too, so every earlier message has been applied by the time this returns.
fn settle(server: &FakeServer, client: &NetClient, count: usize) -> Vec<String> {
    server.send("PONG", client.local_addr());
    let mut seen = wait_for_raw(client, count + 1);
    assert_eq!(seen.pop().as_deref(), Some("PONG"));
    seen
}

fn connected_client(server: &FakeServer, config: ClientConfig) -> NetClient {
    let client = NetClient::start(config).unwrap();
    let addr = server.addr();
    client.set_server("127.0.0.1", addr.port()).unwrap();
    client.connect("Tester").unwrap();

    let (text, from) = server.recv().expect("No CONNECT received");
    assert_eq!(text, "CONNECT name=Tester");
    assert_eq!(from, client.local_addr());
    client
}

#[test]
fn test_connect_sends_sanitized_name() {
    let server = FakeServer::bind();
    let client = NetClient::start(test_config()).unwrap();
    client.set_server("127.0.0.1", server.addr().port()).unwrap();

    client.connect("  Jü@n_99!!").unwrap();
    assert_eq!(client.state(), ConnectionState::AwaitingWelcome);

    let (text, _) = server.recv().expect("No CONNECT received");
    assert_eq!(text, "CONNECT name=Jn_99");
}

#[test]
fn test_full_match_flow() {
    let server = FakeServer::bind();
    let client = connected_client(&server, test_config());
    let to = client.local_addr();

    let t0 = unix_millis() + 500;
    server.send("WELCOME id=2", to);
    server.send("LOBBY players=1;p1=Ann,1", to);
    server.send(&format!("START seed=7;t0={};speed=220", t0), to);
    server.send("RIVAL_STATE id=1;y=50;g=1;s=0;hp=9;score=12", to);
    server.send("RESULT winner=2;reason=opponent_dead", to);

    let raw = settle(&server, &client, 5);
    assert_eq!(raw[0], "WELCOME id=2");
    assert_eq!(raw[4], "RESULT winner=2;reason=opponent_dead");

    assert!(client.is_connected());
    assert_eq!(client.session_id(), 2);
    assert_eq!(client.state(), ConnectionState::Connected(MatchPhase::Finished));

    let lobby = client.lobby_snapshot();
    assert_eq!(lobby.players, 1);
    assert_eq!(lobby.p1.name.as_deref(), Some("Ann"));
    assert!(lobby.p1.ready);
    assert!(!lobby.p2.is_occupied());

    let start = client.consume_start().expect("START not delivered");
    assert_eq!(start.seed, 7);
    assert_eq!(start.t0_ms, t0);
    assert_eq!(start.speed, 220.0);
    assert!(client.consume_start().is_none());

    let rival = client.latest_rival_state().expect("No rival state");
    assert_eq!(rival.id, 1);
    assert_eq!(rival.y, 50.0);
    assert_eq!(rival.hp, 9);
    assert_eq!(rival.score, 12);
    assert_eq!(client.latest_rival_state(), Some(rival));

    let result = client.consume_result().expect("RESULT not delivered");
    assert_eq!(result.winner, client.session_id());
    assert_eq!(result.reason.as_deref(), Some("opponent_dead"));
    assert!(client.consume_result().is_none());
}

#[test]
fn test_outbound_messages() {
    let server = FakeServer::bind();
    let client = connected_client(&server, test_config());

    client.set_ready(true);
    assert_eq!(server.recv().unwrap().0, "READY v=1");

    client.set_ready(false);
    assert_eq!(server.recv().unwrap().0, "READY v=0");

    client.send_player_state(PlayerState {
        y: 12.5,
        on_ground: true,
        sliding: false,
        hp: 7,
        score: 40,
    });
    assert_eq!(server.recv().unwrap().0, "STATE y=12.5;g=1;s=0;hp=7;score=40");

    client.report_death(40, 18);
    assert_eq!(server.recv().unwrap().0, "DEAD score=40;time=18");

    assert!(client.stats().packets_sent >= 5);
}

#[test]
fn test_garbage_does_not_stop_receive_loop() {
    let server = FakeServer::bind();
    let client = connected_client(&server, test_config());
    let to = client.local_addr();

    server.socket.send_to(&[0xff, 0x00, 0xfe], to).unwrap();
    server.send("BOGUS a=1", to);
    server.send("WELCOME", to);

    settle(&server, &client, 3);
    assert!(client.is_connected());
    assert_eq!(client.session_id(), 0);
}

#[test]
fn test_duplicate_start_consumed_once() {
    let server = FakeServer::bind();
    let client = connected_client(&server, test_config());
    let to = client.local_addr();

    server.send("WELCOME id=1", to);
    server.send("START seed=3;t0=0;speed=200", to);
    server.send("START seed=3;t0=0;speed=200", to);
    settle(&server, &client, 3);

    assert_eq!(client.consume_start().map(|start| start.seed), Some(3));
    assert!(client.consume_start().is_none());
}

#[test]
fn test_keepalive_pings_server() {
    let server = FakeServer::bind();
    let config = ClientConfig {
        ping_interval: Duration::from_millis(50),
        ..test_config()
    };
    let client = connected_client(&server, config);

    let from = server.recv_ping().expect("No PING received");
    assert_eq!(from, client.local_addr());
}

#[test]
fn test_disconnect_notifies_server_and_stops() {
    let server = FakeServer::bind();
    let config = ClientConfig {
        ping_interval: Duration::from_millis(50),
        ..test_config()
    };
    let client = connected_client(&server, config);
    server.send("WELCOME id=1", client.local_addr());
    assert!(wait_for(1000, || client.is_connected().then_some(())).is_some());

    let started = Instant::now();
    client.disconnect();
    assert!(started.elapsed() < Duration::from_millis(1000));

    let (text, _) = server.recv().expect("No DISCONNECT received");
    assert_eq!(text, "DISCONNECT");
    assert_eq!(client.state(), ConnectionState::Idle);

    client.set_ready(true);
    assert!(server.recv().is_none());
}

#[test]
fn test_discovery_times_out() {
    let unused_port = {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().port()
    };
    let client = NetClient::start(test_config()).unwrap();

    let started = Instant::now();
    let outcome = client
        .discover_and_connect("Ann", unused_port, Duration::from_millis(1000))
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, DiscoveryOutcome::NotFound);
    assert!(elapsed >= Duration::from_millis(950), "returned after {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(1300), "returned after {:?}", elapsed);
    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(client.server_addr().is_none());
}

#[test]
fn test_discovery_resolves_on_here() {
    let server = FakeServer::bind();
    let client = NetClient::start(test_config()).unwrap();
    let to = client.local_addr();

    // Answer from a different socket than the one listening on the
    // discovery port.
    let responder = {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            socket.send_to(b"HERE", to).unwrap();
        })
    };

    let outcome = client
        .discover_and_connect("Bob", server.addr().port(), Duration::from_millis(3000))
        .unwrap();
    responder.join().unwrap();

    assert_eq!(outcome, DiscoveryOutcome::Found(server.addr()));
    assert_eq!(client.server_addr(), Some(server.addr()));
    assert_eq!(client.state(), ConnectionState::AwaitingWelcome);

    let (text, from) = server.recv().expect("No CONNECT received");
    assert_eq!(text, "CONNECT name=Bob");
    assert_eq!(from, to);
}

#[test]
fn test_unsolicited_here_is_ignored() {
    let server = FakeServer::bind();
    let stray = UdpSocket::bind("127.0.0.1:0").unwrap();
    let client = NetClient::start(test_config()).unwrap();

    stray.send_to(b"HERE", client.local_addr()).unwrap();
    settle(&server, &client, 1);

    assert!(client.server_addr().is_none());
    assert_eq!(client.state(), ConnectionState::Idle);

    let addr = client.set_server("127.0.0.1", server.addr().port()).unwrap();
    assert_eq!(addr, server.addr());
}

mod runner;

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use dinolink::{ClientConfig, DiscoveryOutcome, NetClient};

use runner::{Runner, RunnerOptions};

#[derive(Parser)]
#[command(name = "dinolink-client")]
#[command(about = "Headless LAN match client")]
struct Args {
    #[arg(short, long, default_value = "Player", help = "Display name sent to the server")]
    name: String,

    #[arg(short, long, help = "Server host to connect to directly (skips LAN discovery)")]
    server: Option<String>,

    #[arg(short, long, default_value_t = dinolink::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = 3000, help = "How long to broadcast DISCOVER, in ms")]
    discover_timeout_ms: u64,

    #[arg(long, help = "Mark this player ready once connected")]
    ready: bool,

    #[arg(long, default_value_t = 20, help = "State broadcasts per second")]
    tick_rate: u32,

    #[arg(long, help = "Report death after this many seconds of play")]
    die_after_secs: Option<u32>,

    #[arg(long, help = "Print every raw message received")]
    raw: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ClientConfig {
        server_port: args.port,
        discovery_timeout: Duration::from_millis(args.discover_timeout_ms),
        ..Default::default()
    };
    let client = NetClient::start(config)?;

    match &args.server {
        Some(host) => {
            client
                .set_server(host, args.port)
                .with_context(|| format!("Cannot use server {}:{}", host, args.port))?;
            client.connect(&args.name)?;
        }
        None => match client.discover(&args.name)? {
            DiscoveryOutcome::Found(addr) => log::info!("Found server at {}", addr),
            DiscoveryOutcome::NotFound => {
                bail!("No server answered on port {}", args.port)
            }
        },
    }

    let options = RunnerOptions {
        ready: args.ready,
        print_raw: args.raw,
        tick: Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64),
        die_after: args.die_after_secs.map(|secs| Duration::from_secs(secs as u64)),
    };

    let result = Runner::new(&client, options).run();
    client.disconnect();

    if result.is_draw() {
        log::info!("Match ended in a draw ({})", result.reason.as_deref().unwrap_or("-"));
    } else if result.is_winner(client.session_id()) {
        log::info!("You won ({})", result.reason.as_deref().unwrap_or("-"));
    } else {
        log::info!("You lost ({})", result.reason.as_deref().unwrap_or("-"));
    }

    Ok(())
}

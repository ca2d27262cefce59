//! # race_client
//!
//! A headless racing client. It lays out an oval, puts autopilot cars on
//! the grid, and runs the world at roughly 60 frames a second until the
//! race finishes, the time limit passes, or Ctrl-C.
//!
//! ## Startup Sequence
//!
//! 1. Load the race config (JSON file or defaults) and apply CLI overrides.
//! 2. Join the room, over NATS or an in-process relay with `--offline`.
//! 3. Build the track and grid, announce the cars, start the countdown.
//! 4. Enter the frame loop.

mod driver;
mod session;
mod track;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use engine_net::{NatsConfig, NatsTransport, RelayHub, Transport, WireFormat, new_client_id};
use race_core::RaceConfig;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use session::{FIRST_FRAME_MS, Session};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "race-client", about = "Headless multiplayer racing client")]
struct Args {
    /// NATS server URL
    #[arg(short, long, env = "NATS_URL")]
    nats_url: Option<String>,

    /// Race room to join
    #[arg(short, long, default_value = "lobby")]
    room: String,

    /// JSON race config; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the lap count from the config
    #[arg(short, long)]
    laps: Option<u32>,

    /// Cars this client drives
    #[arg(long, default_value_t = 2)]
    racers: usize,

    /// Checkpoints around the oval, start line included
    #[arg(long, default_value_t = 8)]
    checkpoints: u32,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 300.0)]
    max_seconds: f64,

    /// Use MessagePack on the wire instead of JSON
    #[arg(long)]
    msgpack: bool,

    /// Race against a private in-process relay instead of NATS
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("race_client=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading race config");
            RaceConfig::load(path)?
        }
        None => RaceConfig::default(),
    };
    if let Some(laps) = args.laps {
        config = config.with_total_laps(laps);
    }
    config.validate()?;

    let client_id = new_client_id();
    let transport: Box<dyn Transport> = if args.offline {
        info!(room = args.room, "racing offline");
        Box::new(RelayHub::new().join(&args.room, client_id))
    } else {
        let mut nats = NatsConfig::new(&args.room).with_client_id(client_id);
        if let Some(url) = &args.nats_url {
            nats = nats.with_url(url);
        }
        if args.msgpack {
            nats = nats.with_format(WireFormat::MessagePack);
        }
        Box::new(NatsTransport::connect(nats).await?)
    };

    let mut session = Session::new(&config, transport, args.racers, args.checkpoints)?;
    session.prime()?;

    let limit = Duration::try_from_secs_f64(args.max_seconds)?;
    let started = Instant::now();
    run(&mut session, started, limit).await;

    session.shutdown(clock_ms(started));
    info!("race client shut down");
    Ok(())
}

fn clock_ms(started: Instant) -> f64 {
    FIRST_FRAME_MS + started.elapsed().as_secs_f64() * 1000.0
}

async fn run(session: &mut Session, started: Instant, limit: Duration) {
    let mut ticker = tokio::time::interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(frame_ms = FRAME.as_millis() as u64, limit_s = limit.as_secs(), "starting frame loop");
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return;
            }
        }

        if started.elapsed() >= limit {
            warn!(limit_s = limit.as_secs(), "time limit reached before the race finished");
            return;
        }

        let frame_start = Instant::now();
        session.frame(clock_ms(started));
        if session.is_finished() {
            return;
        }

        let spent = frame_start.elapsed();
        if spent > FRAME {
            warn!(
                elapsed_ms = spent.as_millis() as u64,
                budget_ms = FRAME.as_millis() as u64,
                "frame exceeded time budget"
            );
        }
    }
}

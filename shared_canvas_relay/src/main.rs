// CLI entry point for the shared canvas relay.
//
// Starts a standalone relay that drawing clients connect to, then blocks
// until the process is killed. See `server.rs` for the networking
// architecture and `session.rs` for the relay state.
//
// Usage:
//   relay [OPTIONS]
//     --bind <ADDR>                 Listen address (default: 127.0.0.1)
//     --port <PORT>                 Listen port (default: 7878)
//     --max-replay-strokes <N>      Strokes kept for late joiners (default: 100000)
//     --log-json                    Emit logs as JSON
//
// Every option except --log-json can also be set through the environment
// variable shown in `--help`.

use std::net::IpAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shared_canvas_relay::server::{RelayConfig, start_relay};

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about = "Event relay for a multi-user shared drawing canvas")]
struct Args {
    /// Address to listen on.
    #[arg(long = "bind", env = "CANVAS_RELAY_BIND", default_value = "127.0.0.1")]
    bind_addr: IpAddr,

    /// Port to listen on (0 picks a free port).
    #[arg(long, env = "CANVAS_RELAY_PORT", default_value_t = 7878)]
    port: u16,

    /// Strokes kept for join-time replay; oldest are dropped first.
    #[arg(long, env = "CANVAS_RELAY_MAX_REPLAY_STROKES", default_value_t = 100_000)]
    max_replay_strokes: usize,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shared_canvas_relay=info"));
    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting shared canvas relay");

    let config = RelayConfig {
        bind_addr: args.bind_addr,
        port: args.port,
        max_replay_strokes: args.max_replay_strokes,
    };
    let (handle, addr) = start_relay(config)?;
    info!(%addr, "press Ctrl+C to stop");

    // The process exits on SIGINT/SIGTERM; nothing needs flushing.
    handle.wait();
    Ok(())
}

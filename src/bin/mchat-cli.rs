//! Minimal MChat harness: connect to a channel, optionally send one message,
//! print everything received until interrupted.
//!
//! Demonstration/integration-testing vehicle only — not part of the
//! library's public contract. Grounded on `mchat`'s own `tracing`/`clap`
//! init pattern (env-filter, `#[tokio::main]`, `ctrl_c` shutdown).

use std::time::Duration;

use clap::Parser;
use mchat::{MchatConfig, MchatEngine};
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "mchat-cli", version, about = "MChat: LAN multicast chat")]
struct Args {
    /// Channel to connect to (defaults to #mchat)
    #[arg(short, long)]
    channel: Option<String>,

    /// Nickname override
    #[arg(short, long)]
    nickname: Option<String>,

    /// Start in stealth mode (no PING/CDSC emission)
    #[arg(long)]
    stealth: bool,

    /// Send this one message on startup, then keep listening
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mchat=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!("mchat-cli v{VERSION}");

    let cfg = MchatConfig { nickname: args.nickname, stealth_at_startup: args.stealth, ..Default::default() };

    let engine = match MchatEngine::init(cfg).await {
        Ok(e) => e,
        Err(e) => {
            error!("failed to initialize engine: {e}");
            return;
        }
    };

    if let Err(e) = engine.connect(args.channel.as_deref()).await {
        error!("failed to connect: {e}");
        engine.destroy().await;
        return;
    }

    let channel_name = engine.get_channel().await.map(|c| c.name).unwrap_or_default();
    info!(channel = %channel_name, nickname = %engine.get_nickname().await, "connected");

    if let Some(message) = args.message {
        if let Err(e) = engine.send_message(message.as_bytes()).await {
            error!("failed to send message: {e}");
        }
    }

    let engine_recv = &engine;
    let recv_loop = async {
        loop {
            match engine_recv.recv_message().await {
                Ok(Some(msg)) => {
                    println!("[{}] {}: {}", msg.source_address, msg.nickname, String::from_utf8_lossy(&msg.body));
                }
                Ok(None) => tokio::time::sleep(Duration::from_millis(200)).await,
                Err(e) => {
                    error!("recv failed: {e}");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = recv_loop => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    engine.destroy().await;
}

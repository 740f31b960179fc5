use clap::Parser;
use client::input::ScriptedInput;
use client::network::{Client, DisconnectNotice, SessionEnd, SessionStatus};
use log::{info, warn};
use std::time::{Duration, Instant};

const RETRY_POLL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Player name (at most 10 characters)
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// How long to play before leaving
    #[arg(short = 'd', long, default_value = "30")]
    duration_secs: u64,

    /// Seed for the scripted input
    #[arg(long)]
    seed: Option<u64>,

    /// Rejoin once the disconnect notice expires instead of exiting
    #[arg(short = 'r', long)]
    reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    let mut input = ScriptedInput::new(args.seed);
    let mut status = SessionStatus::Menu;
    let mut client = None;

    loop {
        match status {
            SessionStatus::Menu => {
                if Instant::now() >= deadline {
                    return Ok(());
                }
                match Client::connect(&args.server, &args.name).await {
                    Ok(joined) => {
                        info!("Playing as {} ({})", joined.name(), joined.color());
                        client = Some(joined);
                        status = SessionStatus::Playing;
                    }
                    Err(e) if args.reconnect => {
                        warn!("Could not join: {}", e);
                        status = SessionStatus::Disconnected(DisconnectNotice::new(e.to_string()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            SessionStatus::Playing => {
                let Some(mut session) = client.take() else {
                    status = SessionStatus::Menu;
                    continue;
                };
                let remaining = deadline.saturating_duration_since(Instant::now());
                match session.run(&mut input, Some(remaining)).await? {
                    SessionEnd::Left => {
                        info!("Left the game");
                        return Ok(());
                    }
                    SessionEnd::Lost(notice) => {
                        warn!("Connection lost: {}", notice.reason);
                        if !args.reconnect {
                            return Err(notice.reason.into());
                        }
                        status = SessionStatus::Disconnected(notice);
                    }
                }
            }
            SessionStatus::Disconnected(_) => {
                tokio::time::sleep(RETRY_POLL).await;
                status.refresh(Instant::now());
            }
        }
    }
}

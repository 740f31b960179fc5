use clap::Parser;
use log::{error, info};
use server::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of simultaneous connections
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds of silence before a connection is kicked
    #[arg(long, default_value = "5")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.timeout_secs),
    };

    info!("Starting server on {}", config.bind_addr());
    let mut server = Server::new(config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                shutdown.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}

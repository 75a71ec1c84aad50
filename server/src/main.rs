use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use shared::{DEFAULT_PORT, DEFAULT_QUIZ_INTERVAL_SECS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds between quiz rounds
    #[arg(short = 'q', long, default_value_t = DEFAULT_QUIZ_INTERVAL_SECS)]
    quiz_interval: u64,

    /// Maximum number of concurrent clients
    #[arg(short = 'm', long, default_value = "64")]
    max_clients: usize,

    /// Seed for reproducible quiz puzzles
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        address: format!("{}:{}", args.host, args.port),
        quiz_interval: Duration::from_secs(args.quiz_interval),
        max_clients: args.max_clients,
        seed: args.seed,
    };

    info!("Starting server...");
    info!(
        "Quiz every {}s, up to {} clients",
        config.quiz_interval.as_secs(),
        config.max_clients
    );

    let server = Server::new(config).await?;
    server.run().await?;

    info!("Server stopped");
    Ok(())
}

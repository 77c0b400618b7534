use std::num::TryFromIntError;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry::{Config, MAXLINE, Server};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Concurrent HTTP/1.x forwarding proxy", long_about = None)]
struct Cli {
    /// Port to listen on
    port: u16,

    /// Access log file, appended to
    #[arg(short, long, default_value = "proxy.log")]
    log: PathBuf,

    /// Interface to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Maximum number of connections handled at once (default: no limit)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_connections: Option<u64>,

    /// Largest single read from the origin while relaying
    #[arg(long, default_value_t = MAXLINE)]
    chunk_size: usize,

    /// Largest request header block accepted from a client
    #[arg(long, default_value_t = 1 << 20)]
    max_request_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .init();

    Server::bind(cli.into_config()?).await?.serve().await?;
    Ok(())
}

impl Cli {
    fn into_config(self) -> Result<Config, TryFromIntError> {
        Ok(Config {
            bind_host: self.bind,
            log_path: self.log,
            max_connections: self.max_connections.map(usize::try_from).transpose()?,
            relay_chunk_size: self.chunk_size,
            max_request_bytes: self.max_request_bytes,
            ..Config::new(self.port)
        })
    }
}

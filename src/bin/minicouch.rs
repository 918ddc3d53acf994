//! Server binary

use clap::Parser;
use minicouch::common::{BucketConfig, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minicouch")]
#[command(about = "CouchDB-compatible document database over a K/V bucket")]
struct Cli {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0:4984")]
    bind: SocketAddr,

    /// Bucket server URL
    #[arg(long, default_value = "memory:")]
    url: String,

    /// Name of pool
    #[arg(long, default_value = "default")]
    pool: String,

    /// Name of bucket
    #[arg(long, default_value = "couchdb")]
    bucket: String,

    /// Optional JSON config file; flags left at their defaults defer to it
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig {
        bind_addr: cli.bind,
        bucket: BucketConfig {
            url: cli.url,
            pool: cli.pool,
            name: cli.bucket,
        },
    };
    if let Some(path) = &cli.config {
        let file = ServerConfig::from_file(path)?;
        let defaults = ServerConfig::default();
        if config.bind_addr == defaults.bind_addr {
            config.bind_addr = file.bind_addr;
        }
        if config.bucket.url == defaults.bucket.url {
            config.bucket.url = file.bucket.url;
        }
        if config.bucket.pool == defaults.bucket.pool {
            config.bucket.pool = file.bucket.pool;
        }
        if config.bucket.name == defaults.bucket.name {
            config.bucket.name = file.bucket.name;
        }
    }
    config.validate()?;

    let bucket = minicouch::bucket::connect(&config.bucket)?;
    minicouch::rest::serve(&config, bucket).await?;

    Ok(())
}

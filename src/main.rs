use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatd::signal::shutdown_signal;
use chatd::{Config, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatd=info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("starting chat server on {}", config.listen_addr());

    let server = Server::bind(config).await?;
    let shutdown = shutdown_signal()?;

    server.run_until(shutdown).await
}

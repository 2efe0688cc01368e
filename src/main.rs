//! `wikid` binary: parse configuration, set up logging, serve until signalled.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wikid::{Config, Server};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // --verbose forces debug; otherwise RUST_LOG, falling back to info.
    let filter = if config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(config).await {
        tracing::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(config: Config) -> Result<(), wikid::Error> {
    let app = config.open_wiki()?.router();
    tracing::info!(data_dir = %config.data_dir.display(), "serving pages");
    Server::bind(config.addr)
        .max_body_bytes(config.max_body_bytes)
        .serve(app)
        .await
}

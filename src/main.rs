// PoSyg node - Entry point

#![allow(dead_code)]

mod cli;
mod consensus;
mod crypto;
mod ledger;
mod network;
mod types;


use clap::Parser;
use cli::config::NodeConfig;
use cli::runner::run_node;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    println!("posyg-node {}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::from_cli(&cli)?;
    run_node(config).await
}

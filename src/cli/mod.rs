// CLI - Command line surface of the PoSyg node
pub mod config;
pub mod runner;

use clap::Parser;

/// Proof of Synergy node - incentive-weighted consensus simulator
#[derive(Parser, Debug)]
#[command(name = "posyg-node")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a Proof of Synergy node: scoring cycles, block rounds, fork-aware ledger")]
pub struct Cli {
    /// Stable identifier of this node within the peer set
    pub node_id: u64,

    /// Port announced to peers
    pub port: u16,

    /// Number of participants in the scoring population
    #[arg(long, default_value_t = 10, env = "POSYG_PARTICIPANTS")]
    pub participants: usize,

    /// Number of validators taking part in each round
    #[arg(long, default_value_t = 4, env = "POSYG_VALIDATORS")]
    pub validators: usize,

    /// Stop after this many rounds (runs forever when omitted)
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Seconds between rounds
    #[arg(long, default_value_t = 10)]
    pub interval: u64,

    /// Seed for the behavior policy; omit for a fresh random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Initial ledger difficulty
    #[arg(long, default_value_t = 3)]
    pub difficulty: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "POSYG_LOG")]
    pub log_level: String,
}

// Node configuration built from the command line
use super::Cli;
use std::time::Duration;
use thiserror::Error;

/// Validated runtime configuration for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: u64,
    pub port: u16,
    pub participants: usize,
    pub validators: usize,
    pub cycles: Option<u64>,
    pub interval: Duration,
    pub seed: Option<u64>,
    pub difficulty: u64,
}

impl NodeConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.participants == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if cli.validators == 0 || cli.validators > cli.participants {
            return Err(ConfigError::BadValidatorCount {
                validators: cli.validators,
                participants: cli.participants,
            });
        }

        Ok(Self {
            node_id: cli.node_id,
            port: cli.port,
            participants: cli.participants,
            validators: cli.validators,
            cycles: cli.cycles,
            interval: Duration::from_secs(cli.interval),
            seed: cli.seed,
            difficulty: cli.difficulty,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the scoring population cannot be empty")]
    EmptyPopulation,

    #[error("validator count {validators} must be between 1 and the population size {participants}")]
    BadValidatorCount { validators: usize, participants: usize },
}

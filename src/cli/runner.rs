// Runner - Wires the engine, ledger, peers and coordinator together and
// drives the round loop
use super::config::NodeConfig;
use crate::consensus::{ConsensusCoordinator, PoSygEngine, SeededBehavior};
use crate::ledger::Ledger;
use crate::network::PeerRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// How many rounds pass between fork-prune sweeps.
const PRUNE_EVERY: u64 = 10;

/// Run the node loop until the configured round count is exhausted (or
/// forever when none is set).
pub async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    info!(
        node_id = config.node_id,
        port = config.port,
        participants = config.participants,
        validators = config.validators,
        "starting node"
    );

    let engine = match config.seed {
        Some(seed) => PoSygEngine::with_policy(config.participants, Box::new(SeededBehavior::new(seed))),
        None => PoSygEngine::new(config.participants),
    };
    let engine = Arc::new(RwLock::new(engine));
    let ledger = Arc::new(RwLock::new(Ledger::new(config.difficulty)));

    let peers = Arc::new(PeerRegistry::new());
    peers.register_peer(config.node_id, format!("127.0.0.1:{}", config.port));

    let mut coordinator = ConsensusCoordinator::new(
        config.validators,
        Arc::clone(&engine),
        Arc::clone(&ledger),
        Arc::clone(&peers),
    );

    let mut interval = tokio::time::interval(config.interval);
    let mut completed = 0u64;

    loop {
        interval.tick().await;

        let summary = engine.write().run_cycle();
        info!(
            cycle = summary.cycle,
            dishonest_ratio = summary.dishonest_ratio,
            newly_slashed = summary.newly_slashed,
            "scoring cycle finished"
        );

        let outcome = coordinator.initiate_consensus()?;
        info!(
            round = outcome.round,
            state = ?outcome.state,
            signatures = outcome.signatures,
            block = outcome.block_hash.as_deref().unwrap_or("-"),
            "consensus round finished"
        );

        {
            let ledger = ledger.read();
            debug!(height = ledger.height(), tip = %ledger.tip_hash(), "chain state");
        }

        completed += 1;
        if completed % PRUNE_EVERY == 0 {
            ledger.write().prune_forks();
        }

        if let Some(limit) = config.cycles {
            if completed >= limit {
                break;
            }
        }
    }

    let stats = engine.read().statistics();
    let stats_json = serde_json::to_string(&stats)?;
    info!(stats = %stats_json, "final network statistics");
    Ok(())
}

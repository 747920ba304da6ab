// Consensus coordinator - Drives one round: propose, validate, collect
// multisignatures, finalize, then slash and reward
//
// The coordinator orchestrates but owns neither store: it holds shared
// handles to the engine and the ledger injected at construction. Stages of
// a round run strictly in order; only the interior of signature collection
// fans out.

use super::engine::{EngineError, PoSygEngine};
use crate::ledger::{Ledger, LedgerError};
use crate::network::PeerRegistry;
use crate::types::{Block, ParticipantId};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Validator signatures a block needs before it can be finalized.
pub const REQUIRED_SIGNATURES: usize = 2;

/// Starting value of the per-round slashing penalty.
pub const INITIAL_SLASHING_PENALTY: f64 = 100.0;

/// Starting value of the flat per-round validator reward.
pub const INITIAL_VALIDATOR_REWARD: f64 = 50.0;

/// Lifecycle of a consensus round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Proposed,
    Validated,
    SignatureCollection,
    Finalized,
    Rejected,
}

/// What a round produced, reported whether or not it finalized.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round: u64,
    pub state: RoundState,
    pub block_hash: Option<String>,
    pub signatures: usize,
}

pub struct ConsensusCoordinator {
    validators: Vec<ParticipantId>,
    engine: Arc<RwLock<PoSygEngine>>,
    ledger: Arc<RwLock<Ledger>>,
    peers: Arc<PeerRegistry>,
    current_block: Option<Block>,
    state: RoundState,
    slashing_penalty: f64,
    validator_reward: f64,
    round: u64,
}

impl ConsensusCoordinator {
    pub fn new(
        num_validators: usize,
        engine: Arc<RwLock<PoSygEngine>>,
        ledger: Arc<RwLock<Ledger>>,
        peers: Arc<PeerRegistry>,
    ) -> Self {
        Self {
            validators: (0..num_validators as ParticipantId).collect(),
            engine,
            ledger,
            peers,
            current_block: None,
            state: RoundState::Idle,
            slashing_penalty: INITIAL_SLASHING_PENALTY,
            validator_reward: INITIAL_VALIDATOR_REWARD,
            round: 0,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.current_block.as_ref()
    }

    /// Run one full round. Structural failures end the round as Rejected
    /// without touching the ledger; the slash-and-reward pass runs in every
    /// case.
    pub fn initiate_consensus(&mut self) -> Result<RoundOutcome, ConsensusError> {
        self.round += 1;
        info!(round = self.round, validators = self.validators.len(), "initiating consensus round");

        self.adjust_round_parameters();

        let block = self.create_new_block();
        let mut block_hash = None;
        let mut signatures = 0;

        if self.validate_block(&block) {
            let signed = self.collect_signatures(block);
            signatures = signed.signature_count();
            if signed.has_required_signatures() {
                block_hash = Some(signed.hash().to_string());
                self.finalize_block(signed)?;
            } else {
                warn!(round = self.round, signatures, "signature collection fell short; round rejected");
                self.state = RoundState::Rejected;
            }
        } else {
            info!(round = self.round, "block validation failed; round rejected");
        }

        self.validate_and_slash()?;
        self.distribute_rewards()?;

        Ok(RoundOutcome {
            round: self.round,
            state: self.state,
            block_hash,
            signatures,
        })
    }

    /// Propose a block skeleton at the next chain position, linked to the
    /// current tip.
    pub fn create_new_block(&mut self) -> Block {
        let ledger = self.ledger.read();
        let mut block = Block::new(
            ledger.block_count() as u64,
            ledger.tip_hash(),
            REQUIRED_SIGNATURES,
        );
        drop(ledger);
        block.seal();

        debug!(number = block.number(), "proposed new block");
        self.state = RoundState::Proposed;
        block
    }

    /// Structural check only: the block must be linked and sealed. Full
    /// verification stays with the ledger's chain validation.
    pub fn validate_block(&mut self, block: &Block) -> bool {
        if block.previous_hash().is_empty() {
            warn!(number = block.number(), "rejected block with empty previous hash");
            self.state = RoundState::Rejected;
            return false;
        }
        if block.hash().is_empty() {
            warn!(number = block.number(), "rejected unsealed block");
            self.state = RoundState::Rejected;
            return false;
        }
        self.state = RoundState::Validated;
        true
    }

    /// Collect validator signatures on a private working copy of the block.
    ///
    /// Validators race in parallel, but the full-check and the append are a
    /// single step under the block mutex, so the threshold can never be
    /// overshot no matter how the attempts interleave. The `full` flag only
    /// lets late validators skip the lock once the threshold is known to be
    /// reached.
    pub fn collect_signatures(&mut self, block: Block) -> Block {
        self.state = RoundState::SignatureCollection;
        let number = block.number();
        debug!(number, "collecting signatures");

        let shared = Mutex::new(block);
        let full = AtomicBool::new(false);

        self.validators.par_iter().for_each(|validator| {
            if full.load(Ordering::Acquire) {
                return;
            }
            let signature = format!("validator-{validator}");
            let mut guard = shared.lock();
            if guard.sign(signature) {
                if guard.has_required_signatures() {
                    full.store(true, Ordering::Release);
                }
            } else {
                full.store(true, Ordering::Release);
            }
        });

        let signed = shared.into_inner();
        if signed.has_required_signatures() {
            info!(number, signatures = signed.signature_count(), "block reached its signature threshold");
        } else {
            warn!(number, signatures = signed.signature_count(), "block is short of its signature threshold");
        }
        signed
    }

    /// Make the signed block current, append it to the ledger and announce
    /// the finalized hash. Peers being unreachable never fails the round.
    pub fn finalize_block(&mut self, block: Block) -> Result<(), ConsensusError> {
        let hash = block.hash().to_string();
        let number = block.number();

        self.ledger.write().add_block(block.clone())?;
        self.current_block = Some(block);
        self.state = RoundState::Finalized;

        let delivered = self.peers.broadcast(&format!("finalized block {number} with hash {hash}"));
        info!(number, %hash, delivered, "block finalized");
        Ok(())
    }

    /// Slash every validator the registry currently flags as suspicious.
    pub fn validate_and_slash(&mut self) -> Result<(), ConsensusError> {
        let mut engine = self.engine.write();
        for validator in &self.validators {
            if engine.slash_if_suspicious(*validator)? {
                info!(validator, "validator slashed for suspicious behavior");
            }
        }
        Ok(())
    }

    /// Credit the flat participation reward to every round validator. This
    /// is distinct from the registry's proportional synergy distribution.
    pub fn distribute_rewards(&mut self) -> Result<(), ConsensusError> {
        let mut engine = self.engine.write();
        for validator in &self.validators {
            engine.participant_mut(*validator)?.reward += self.validator_reward;
        }
        debug!(reward = self.validator_reward, "participation rewards distributed");
        Ok(())
    }

    /// Geometric per-round drift of the slashing penalty and the validator
    /// reward. Deliberately uncapped; long runs should watch these values.
    pub fn adjust_round_parameters(&mut self) {
        self.slashing_penalty *= 1.05;
        self.validator_reward *= 1.02;
        debug!(
            slashing_penalty = self.slashing_penalty,
            validator_reward = self.validator_reward,
            "round parameters adjusted"
        );
    }
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

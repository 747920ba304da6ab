// Ledger - Canonical chain, competing forks, rollback and the pending
// transaction pool
//
// The ledger is the single writer over its chain and fork maps: all
// mutation goes through `&mut self`, reads may run concurrently. Blocks
// cross this boundary by value; nothing outside the ledger can mutate a
// stored block.

use crate::crypto;
use crate::types::{Block, BlockNumber, Transaction, GENESIS_PREVIOUS_HASH};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Forks trailing the canonical height by more than this many blocks are
/// dropped on the next prune pass.
pub const FORK_PRUNE_WINDOW: u64 = 10;

/// Signature carried by the genesis block.
pub const GENESIS_SIGNATURE: &str = "genesis";

/// A tracked fork: its blocks plus the difficulty accumulated while it was
/// being extended.
#[derive(Debug, Clone, Default)]
struct ForkState {
    blocks: Vec<Block>,
    total_difficulty: u64,
}

/// The chain store. Sole authority for genesis state.
pub struct Ledger {
    chain: Vec<Block>,
    tip_hash: String,
    difficulty: u64,
    forks: HashMap<String, ForkState>,
    confirmed: HashSet<String>,
    pending: Vec<Transaction>,
}

impl Ledger {
    /// Build a ledger anchored on a freshly signed genesis block.
    pub fn new(initial_difficulty: u64) -> Self {
        let mut genesis = Block::new(0, GENESIS_PREVIOUS_HASH, 1);
        genesis.sign(GENESIS_SIGNATURE);
        genesis.seal();
        let tip_hash = genesis.hash().to_string();
        info!(tip = %tip_hash, "genesis block created");

        Self {
            chain: vec![genesis],
            tip_hash,
            difficulty: initial_difficulty,
            forks: HashMap::new(),
            confirmed: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// Number of blocks on the canonical chain (genesis included).
    pub fn block_count(&self) -> usize {
        self.chain.len()
    }

    /// Block number of the canonical tip.
    pub fn height(&self) -> BlockNumber {
        self.chain.len() as BlockNumber - 1
    }

    pub fn tip_hash(&self) -> &str {
        &self.tip_hash
    }

    pub fn latest_block(&self) -> &Block {
        // chain always holds at least genesis
        &self.chain[self.chain.len() - 1]
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Append a block extending the canonical tip. The tip hash and height
    /// advance together or not at all.
    pub fn add_block(&mut self, block: Block) -> Result<(), LedgerError> {
        if block.previous_hash() != self.tip_hash {
            return Err(LedgerError::ChainMismatch {
                number: block.number(),
                expected: self.tip_hash.clone(),
                found: block.previous_hash().to_string(),
            });
        }
        self.tip_hash = block.hash().to_string();
        debug!(number = block.number(), tip = %self.tip_hash, "block appended");
        self.chain.push(block);
        Ok(())
    }

    /// Append a block to the named fork, creating the fork entry lazily and
    /// accumulating the current difficulty.
    pub fn add_fork_block(&mut self, fork_tip: &str, block: Block) {
        let fork = self.forks.entry(fork_tip.to_string()).or_default();
        fork.blocks.push(block);
        fork.total_difficulty += self.difficulty;
    }

    pub fn fork_length(&self, fork_tip: &str) -> Option<usize> {
        self.forks.get(fork_tip).map(|f| f.blocks.len())
    }

    pub fn fork_difficulty(&self, fork_tip: &str) -> Option<u64> {
        self.forks.get(fork_tip).map(|f| f.total_difficulty)
    }

    /// Check linkage and hash integrity over the whole canonical chain.
    /// Read-only; never repairs anything.
    pub fn validate_chain(&self) -> bool {
        Self::validate_sequence(&self.chain)
    }

    /// Check linkage and hash integrity over a fork. Unknown forks fail
    /// validation.
    pub fn validate_fork(&self, fork_tip: &str) -> bool {
        match self.forks.get(fork_tip) {
            Some(fork) => Self::validate_sequence(&fork.blocks),
            None => false,
        }
    }

    fn validate_sequence(blocks: &[Block]) -> bool {
        for pair in blocks.windows(2) {
            let (prior, current) = (&pair[0], &pair[1]);
            if current.previous_hash() != prior.hash() {
                warn!(number = current.number(), "broken previous-hash linkage");
                return false;
            }
            if current.hash() != current.compute_hash() {
                warn!(number = current.number(), "stored hash does not match contents");
                return false;
            }
        }
        true
    }

    /// Truncate the canonical chain by `count` blocks, re-anchoring the tip
    /// on the new last block. Removing the whole chain (or more) is refused
    /// and leaves everything untouched.
    pub fn rollback_chain(&mut self, count: usize) -> Result<(), LedgerError> {
        if count >= self.chain.len() {
            return Err(LedgerError::RollbackOutOfRange {
                requested: count,
                length: self.chain.len(),
            });
        }
        self.chain.truncate(self.chain.len() - count);
        self.tip_hash = self.latest_block().hash().to_string();
        info!(count, height = self.height(), tip = %self.tip_hash, "chain rolled back");
        Ok(())
    }

    /// Adopt a tracked fork: its blocks are appended onto the canonical
    /// chain and the fork entry is removed from the fork map. Callers that
    /// need integrity guarantees must run [`validate_fork`] first; adoption
    /// itself performs no re-check.
    ///
    /// Returns the number of blocks adopted.
    pub fn select_fork(&mut self, fork_tip: &str) -> Result<usize, LedgerError> {
        let fork = self
            .forks
            .remove(fork_tip)
            .ok_or_else(|| LedgerError::UnknownFork(fork_tip.to_string()))?;

        let adopted = fork.blocks.len();
        self.chain.extend(fork.blocks);
        self.tip_hash = self.latest_block().hash().to_string();
        info!(fork = %fork_tip, adopted, height = self.height(), "fork adopted");
        Ok(adopted)
    }

    /// Record a block as confirmed if it sits within the canonical height
    /// and carries its signature threshold. Confirmation is tracked by hash
    /// in a set independent of chain membership.
    pub fn confirm_block(&mut self, block: &Block) -> bool {
        if block.number() <= self.height() && block.has_required_signatures() {
            self.confirmed.insert(block.hash().to_string());
            debug!(number = block.number(), "block confirmed");
            true
        } else {
            false
        }
    }

    pub fn set_confirmation(&mut self, block_hash: &str, confirmed: bool) {
        if confirmed {
            self.confirmed.insert(block_hash.to_string());
        } else {
            self.confirmed.remove(block_hash);
        }
    }

    pub fn is_confirmed(&self, block_hash: &str) -> bool {
        self.confirmed.contains(block_hash)
    }

    /// Merkle root over the transactions in their given order: each leaf is
    /// the hash of the transaction's canonical fields, then adjacent pairs
    /// are hashed upward, duplicating the last entry whenever a level is
    /// odd. The empty list yields the empty root.
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        if transactions.is_empty() {
            return String::new();
        }

        let mut level: Vec<String> = transactions
            .iter()
            .map(|tx| {
                crypto::hash(
                    format!("{}{}{}{}", tx.sender, tx.receiver, tx.amount, tx.signature).as_bytes(),
                )
            })
            .collect();

        while level.len() > 1 {
            if level.len() % 2 != 0 {
                // duplicate the trailing leaf so every node has a sibling
                let last = level[level.len() - 1].clone();
                level.push(last);
            }
            level = level
                .chunks(2)
                .map(|pair| crypto::hash(format!("{}{}", pair[0], pair[1]).as_bytes()))
                .collect();
        }
        level.pop().unwrap_or_default()
    }

    /// Drop forks that have fallen more than [`FORK_PRUNE_WINDOW`] blocks
    /// behind the canonical height.
    pub fn prune_forks(&mut self) {
        let cutoff = self.height().saturating_sub(FORK_PRUNE_WINDOW);
        let before = self.forks.len();
        self.forks.retain(|_, fork| fork.blocks.len() as u64 >= cutoff);
        let pruned = before - self.forks.len();
        if pruned > 0 {
            debug!(pruned, "stale forks dropped");
        }
    }

    /// Queue a transaction for inclusion in a future block. Plain FIFO, no
    /// fee or priority ordering; callers may dedupe.
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    pub fn has_pending_transactions(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Stable-order snapshot of the pending pool.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    #[cfg(test)]
    pub(crate) fn block_mut_for_tests(&mut self, index: usize) -> &mut Block {
        &mut self.chain[index]
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {number} does not extend the chain tip (expected previous hash {expected}, found {found})")]
    ChainMismatch {
        number: BlockNumber,
        expected: String,
        found: String,
    },

    #[error("unknown fork tip {0}")]
    UnknownFork(String),

    #[error("cannot roll back {requested} blocks from a chain of {length}")]
    RollbackOutOfRange { requested: usize, length: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;

    fn next_block(ledger: &Ledger) -> Block {
        let mut block = Block::new(ledger.block_count() as BlockNumber, ledger.tip_hash(), 1);
        block.seal();
        block
    }

    fn unsigned_tx(sender: &str, amount: f64) -> Transaction {
        Transaction::new(sender, "receiver", amount, "sig", TransactionKind::Payment, "")
    }

    #[test]
    fn genesis_only_ledger_is_valid() {
        let ledger = Ledger::new(3);
        assert_eq!(ledger.block_count(), 1);
        assert_eq!(ledger.height(), 0);
        assert!(!ledger.latest_block().hash().is_empty());
        assert_eq!(ledger.latest_block().previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(ledger.latest_block().has_required_signatures());
        assert!(ledger.validate_chain());
    }

    #[test]
    fn chained_blocks_validate() {
        let mut ledger = Ledger::new(3);
        for _ in 0..3 {
            let block = next_block(&ledger);
            ledger.add_block(block).unwrap();
        }
        assert_eq!(ledger.block_count(), 4);
        assert!(ledger.validate_chain());
    }

    #[test]
    fn mismatched_block_is_refused_and_chain_unchanged() {
        let mut ledger = Ledger::new(3);
        let mut stranger = Block::new(1, "not-the-tip", 1);
        stranger.seal();

        let err = ledger.add_block(stranger).unwrap_err();
        assert!(matches!(err, LedgerError::ChainMismatch { .. }));
        assert_eq!(ledger.block_count(), 1);
    }

    #[test]
    fn corrupted_stored_hash_fails_validation() {
        let mut ledger = Ledger::new(3);
        ledger.add_block(next_block(&ledger)).unwrap();
        assert!(ledger.validate_chain());

        ledger.block_mut_for_tests(1).set_hash_for_tests("tampered");
        assert!(!ledger.validate_chain());
    }

    #[test]
    fn rewired_previous_hash_fails_validation() {
        let mut ledger = Ledger::new(3);
        ledger.add_block(next_block(&ledger)).unwrap();
        ledger.add_block(next_block(&ledger)).unwrap();
        assert!(ledger.validate_chain());

        ledger.block_mut_for_tests(2).set_previous_hash_for_tests("elsewhere");
        assert!(!ledger.validate_chain());
    }

    #[test]
    fn rollback_truncates_and_reanchors_the_tip() {
        let mut ledger = Ledger::new(3);
        for _ in 0..4 {
            ledger.add_block(next_block(&ledger)).unwrap();
        }
        assert_eq!(ledger.block_count(), 5);

        ledger.rollback_chain(2).unwrap();
        assert_eq!(ledger.block_count(), 3);
        assert_eq!(ledger.tip_hash(), ledger.latest_block().hash());
        assert!(ledger.validate_chain());

        // rolling forward again from the restored tip works
        ledger.add_block(next_block(&ledger)).unwrap();
        assert!(ledger.validate_chain());
    }

    #[test]
    fn rollback_of_the_whole_chain_is_refused() {
        let mut ledger = Ledger::new(3);
        ledger.add_block(next_block(&ledger)).unwrap();

        let err = ledger.rollback_chain(2).unwrap_err();
        assert!(matches!(err, LedgerError::RollbackOutOfRange { requested: 2, length: 2 }));
        assert_eq!(ledger.block_count(), 2);
        assert_eq!(ledger.tip_hash(), ledger.latest_block().hash());
    }

    #[test]
    fn fork_bookkeeping_tracks_length_and_difficulty() {
        let mut ledger = Ledger::new(3);
        let tip = ledger.tip_hash().to_string();

        let mut fork_block = Block::new(1, tip.as_str(), 1);
        fork_block.seal();
        ledger.add_fork_block(&tip, fork_block);

        assert_eq!(ledger.fork_length(&tip), Some(1));
        assert_eq!(ledger.fork_difficulty(&tip), Some(3));
        assert!(ledger.validate_fork(&tip));
        assert!(!ledger.validate_fork("nobody-home"));
    }

    #[test]
    fn adopting_a_fork_extends_the_chain_and_drops_the_entry() {
        let mut ledger = Ledger::new(3);
        let tip = ledger.tip_hash().to_string();

        let mut first = Block::new(1, tip.as_str(), 1);
        first.seal();
        let mut second = Block::new(2, first.hash(), 1);
        second.seal();
        ledger.add_fork_block(&tip, first);
        ledger.add_fork_block(&tip, second);

        assert!(ledger.validate_fork(&tip));
        let adopted = ledger.select_fork(&tip).unwrap();
        assert_eq!(adopted, 2);
        assert_eq!(ledger.block_count(), 3);
        assert_eq!(ledger.tip_hash(), ledger.latest_block().hash());
        assert!(ledger.validate_chain());
        assert_eq!(ledger.fork_length(&tip), None);
    }

    #[test]
    fn selecting_an_unknown_fork_fails() {
        let mut ledger = Ledger::new(3);
        assert!(matches!(
            ledger.select_fork("missing"),
            Err(LedgerError::UnknownFork(_))
        ));
    }

    #[test]
    fn stale_forks_are_pruned() {
        let mut ledger = Ledger::new(1);
        let anchor = ledger.tip_hash().to_string();
        let mut orphan = Block::new(1, anchor.as_str(), 1);
        orphan.seal();
        ledger.add_fork_block(&anchor, orphan);

        // grow the canonical chain far past the fork
        for _ in 0..12 {
            let mut block = Block::new(ledger.block_count() as BlockNumber, ledger.tip_hash(), 1);
            block.seal();
            ledger.add_block(block).unwrap();
        }

        ledger.prune_forks();
        assert_eq!(ledger.fork_length(&anchor), None);
    }

    #[test]
    fn young_forks_survive_pruning() {
        let mut ledger = Ledger::new(1);
        let anchor = ledger.tip_hash().to_string();
        let mut candidate = Block::new(1, anchor.as_str(), 1);
        candidate.seal();
        ledger.add_fork_block(&anchor, candidate);

        for _ in 0..5 {
            let mut block = Block::new(ledger.block_count() as BlockNumber, ledger.tip_hash(), 1);
            block.seal();
            ledger.add_block(block).unwrap();
        }

        ledger.prune_forks();
        assert_eq!(ledger.fork_length(&anchor), Some(1));
    }

    #[test]
    fn confirmation_requires_height_and_signatures() {
        let mut ledger = Ledger::new(3);

        // beyond the canonical height
        let mut future = Block::new(9, "elsewhere", 1);
        future.sign("v");
        future.seal();
        assert!(!ledger.confirm_block(&future));

        // within height but below the signature threshold
        let mut unsigned = Block::new(0, "elsewhere", 2);
        unsigned.seal();
        assert!(!ledger.confirm_block(&unsigned));

        // genesis itself confirms
        let genesis = ledger.latest_block().clone();
        assert!(ledger.confirm_block(&genesis));
        assert!(ledger.is_confirmed(genesis.hash()));

        ledger.set_confirmation(genesis.hash(), false);
        assert!(!ledger.is_confirmed(genesis.hash()));
    }

    #[test]
    fn merkle_root_of_nothing_is_empty() {
        assert_eq!(Ledger::calculate_merkle_root(&[]), "");
    }

    #[test]
    fn merkle_root_is_deterministic_and_order_sensitive() {
        let txs = vec![unsigned_tx("a", 1.0), unsigned_tx("b", 2.0), unsigned_tx("c", 3.0)];
        let root = Ledger::calculate_merkle_root(&txs);
        assert_eq!(root, Ledger::calculate_merkle_root(&txs));

        let reversed: Vec<_> = txs.iter().rev().cloned().collect();
        assert_ne!(root, Ledger::calculate_merkle_root(&reversed));
    }

    #[test]
    fn odd_merkle_levels_duplicate_the_last_leaf() {
        let odd = vec![unsigned_tx("a", 1.0), unsigned_tx("b", 2.0), unsigned_tx("c", 3.0)];
        let mut padded = odd.clone();
        padded.push(odd[2].clone());

        assert_eq!(
            Ledger::calculate_merkle_root(&odd),
            Ledger::calculate_merkle_root(&padded)
        );
    }

    #[test]
    fn pending_pool_is_fifo() {
        let mut ledger = Ledger::new(3);
        assert!(!ledger.has_pending_transactions());

        ledger.add_transaction(unsigned_tx("first", 1.0));
        ledger.add_transaction(unsigned_tx("second", 2.0));

        let snapshot = ledger.pending_transactions();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].sender, "first");
        assert_eq!(snapshot[1].sender, "second");
        assert!(ledger.has_pending_transactions());
    }
}

// Block - Chain element binding transactions under a content hash and a
// threshold of validator signatures
use super::transaction::Transaction;
use super::{BlockNumber, Timestamp, WireError};
use crate::crypto::{self, CryptoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A block in the chain (or in a candidate fork).
///
/// The content hash is a pure function of `(previous_hash, timestamp,
/// serialized transactions)`. It is cached, never recomputed on read:
/// [`Block::compute_hash`] is the pure function, [`Block::seal`] refreshes
/// the cache, and every transaction admission reseals. Validator signatures
/// are collected separately and are not covered by the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    number: BlockNumber,
    previous_hash: String,
    timestamp: Timestamp,
    transactions: Vec<Transaction>,
    hash: String,
    signatures: Vec<String>,
    required_signatures: usize,
}

impl Block {
    /// Create an unsealed block skeleton. Callers must [`seal`](Block::seal)
    /// it before the hash is meaningful.
    pub fn new(number: BlockNumber, previous_hash: impl Into<String>, required_signatures: usize) -> Self {
        Self {
            number,
            previous_hash: previous_hash.into(),
            timestamp: chrono::Utc::now().timestamp(),
            transactions: Vec::new(),
            hash: String::new(),
            signatures: Vec::new(),
            required_signatures,
        }
    }

    pub fn number(&self) -> BlockNumber {
        self.number
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The cached content hash. Empty until the block is sealed.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn required_signatures(&self) -> usize {
        self.required_signatures
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Recompute the content hash from the current fields. Pure and
    /// idempotent; does not touch the cache.
    pub fn compute_hash(&self) -> String {
        let mut content = format!("{}{}", self.previous_hash, self.timestamp);
        for tx in &self.transactions {
            content.push_str(&tx.serialize());
        }
        crypto::hash(content.as_bytes())
    }

    /// Refresh the cached hash from the current contents.
    pub fn seal(&mut self) {
        self.hash = self.compute_hash();
    }

    /// Admit a transaction after verifying its signature, resealing the
    /// block afterwards.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), BlockError> {
        match tx.verify()? {
            true => {
                self.transactions.push(tx);
                self.seal();
                Ok(())
            }
            false => Err(BlockError::InvalidSignature),
        }
    }

    /// Append a validator signature. Returns `false` once the threshold is
    /// already met; the check and the append are a single step, so callers
    /// holding exclusive access can never overshoot the threshold.
    pub fn sign(&mut self, validator_signature: impl Into<String>) -> bool {
        if self.signatures.len() < self.required_signatures {
            self.signatures.push(validator_signature.into());
            true
        } else {
            false
        }
    }

    /// Whether the finality threshold has been reached.
    pub fn has_required_signatures(&self) -> bool {
        self.signatures.len() >= self.required_signatures
    }

    /// Wire encoding: `number|previous_hash|timestamp|required_signatures|`
    /// followed by each transaction terminated with `#`.
    ///
    /// Validator signatures are not part of the wire format; a deserialized
    /// block restarts signature collection.
    pub fn serialize(&self) -> String {
        let mut wire = format!(
            "{}|{}|{}|{}|",
            self.number, self.previous_hash, self.timestamp, self.required_signatures
        );
        for tx in &self.transactions {
            wire.push_str(&tx.serialize());
            wire.push('#');
        }
        wire
    }

    /// Decode a block, recomputing its hash rather than trusting the wire.
    pub fn deserialize(wire: &str) -> Result<Self, WireError> {
        let mut fields = wire.splitn(5, '|');
        let mut next = |name: &'static str| fields.next().ok_or(WireError::MissingField(name));

        let number_raw = next("number")?;
        let number: BlockNumber = number_raw.parse().map_err(|_| WireError::InvalidNumber {
            field: "number",
            value: number_raw.to_string(),
        })?;
        let previous_hash = next("previous_hash")?.to_string();
        let timestamp_raw = next("timestamp")?;
        let timestamp: Timestamp = timestamp_raw.parse().map_err(|_| WireError::InvalidNumber {
            field: "timestamp",
            value: timestamp_raw.to_string(),
        })?;
        let required_raw = next("required_signatures")?;
        let required_signatures: usize = required_raw.parse().map_err(|_| WireError::InvalidNumber {
            field: "required_signatures",
            value: required_raw.to_string(),
        })?;

        let transactions = fields
            .next()
            .unwrap_or_default()
            .split('#')
            .filter(|record| !record.is_empty())
            .map(Transaction::deserialize)
            .collect::<Result<Vec<_>, _>>()?;

        let mut block = Self {
            number,
            previous_hash,
            timestamp,
            transactions,
            hash: String::new(),
            signatures: Vec::new(),
            required_signatures,
        };
        block.seal();
        Ok(block)
    }

    #[cfg(test)]
    pub(crate) fn set_hash_for_tests(&mut self, hash: impl Into<String>) {
        self.hash = hash.into();
    }

    #[cfg(test)]
    pub(crate) fn set_previous_hash_for_tests(&mut self, previous_hash: impl Into<String>) {
        self.previous_hash = previous_hash.into();
    }
}

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("transaction signature rejected at block admission")]
    InvalidSignature,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

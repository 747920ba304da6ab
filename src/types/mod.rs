// Core value types shared across the node
pub mod block;
pub mod transaction;

pub use block::{Block, BlockError};
pub use transaction::{Transaction, TransactionKind};

use thiserror::Error;

/// Chain position of a block.
pub type BlockNumber = u64;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Dense participant/validator identifier, assigned 0..N-1 at construction
/// and never reused.
pub type ParticipantId = u64;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Errors decoding the pipe-delimited wire format.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("serialized record is missing the {0} field")]
    MissingField(&'static str),

    #[error("invalid {field} field: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown transaction kind ordinal {0:?}")]
    UnknownKind(String),
}

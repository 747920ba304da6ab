// Transaction - Immutable transfer record carried inside blocks
use super::WireError;
use crate::crypto::{self, CryptoError};
use serde::{Deserialize, Serialize};

/// Kind of operation a transaction performs. The wire format carries the
/// ordinal, so variant order is part of the persisted contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Payment,
    Governance,
    SmartContractExecution,
}

impl TransactionKind {
    pub fn ordinal(self) -> u8 {
        match self {
            TransactionKind::Payment => 0,
            TransactionKind::Governance => 1,
            TransactionKind::SmartContractExecution => 2,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(TransactionKind::Payment),
            1 => Some(TransactionKind::Governance),
            2 => Some(TransactionKind::SmartContractExecution),
            _ => None,
        }
    }
}

/// A transfer between two parties, immutable once constructed.
///
/// `sender` is the hex-encoded public key of the originator; `signature` is
/// the hex ed25519 signature over [`Transaction::signing_bytes`]. Field
/// values must not contain the `|` or `#` record separators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub signature: String,
    pub kind: TransactionKind,
    pub payload: String,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        signature: impl Into<String>,
        kind: TransactionKind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            signature: signature.into(),
            kind,
            payload: payload.into(),
        }
    }

    /// Canonical bytes covered by the sender's signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.sender,
            self.receiver,
            self.amount,
            self.kind.ordinal(),
            self.payload
        )
        .into_bytes()
    }

    /// Check the signature against the sender's claimed key material.
    pub fn verify(&self) -> Result<bool, CryptoError> {
        crypto::verify(&self.signing_bytes(), &self.signature, &self.sender)
    }

    /// Wire encoding: `sender|receiver|amount|signature|kind|payload`.
    pub fn serialize(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.sender,
            self.receiver,
            self.amount,
            self.signature,
            self.kind.ordinal(),
            self.payload
        )
    }

    pub fn deserialize(wire: &str) -> Result<Self, WireError> {
        let mut fields = wire.splitn(6, '|');
        let mut next = |name: &'static str| fields.next().ok_or(WireError::MissingField(name));

        let sender = next("sender")?.to_string();
        let receiver = next("receiver")?.to_string();
        let amount_raw = next("amount")?;
        let amount: f64 = amount_raw.parse().map_err(|_| WireError::InvalidNumber {
            field: "amount",
            value: amount_raw.to_string(),
        })?;
        let signature = next("signature")?.to_string();
        let kind_raw = next("kind")?;
        let kind = kind_raw
            .parse::<u8>()
            .ok()
            .and_then(TransactionKind::from_ordinal)
            .ok_or_else(|| WireError::UnknownKind(kind_raw.to_string()))?;
        let payload = fields.next().unwrap_or_default().to_string();

        Ok(Self {
            sender,
            receiver,
            amount,
            signature,
            kind,
            payload,
        })
    }
}

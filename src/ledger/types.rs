/// Transactions, receipts and event logs exchanged with a ledger
use crate::crypto::{keccak256, Address};
use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of a signed transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub B256);

/// Receipts are addressed by the hash of the transaction that produced them.
pub type ReceiptId = TxHash;

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    /// Deterministic byte string covered by the sender's signature.
    pub fn signable_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(8 + 8 + 20 + 20 + 32 + self.data.len());
        message.extend_from_slice(&self.chain_id.to_be_bytes());
        message.extend_from_slice(&self.nonce.to_be_bytes());
        message.extend_from_slice(self.from.as_slice());
        message.extend_from_slice(self.to.as_slice());
        message.extend_from_slice(&self.value.to_be_bytes::<32>());
        message.extend_from_slice(&self.data);
        message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: UnsignedTransaction,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
}

impl SignedTransaction {
    pub fn hash(&self) -> TxHash {
        let mut preimage = self.tx.signable_message();
        preimage.extend_from_slice(&self.signature);
        TxHash(keccak256(preimage))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub timestamp: u64,
    pub status: ReceiptStatus,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Matches logs by emitter and positional topics; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Option<Address>,
    pub topics: Vec<Option<B256>>,
}

impl LogFilter {
    pub fn matches(&self, log: &Log) -> bool {
        if let Some(address) = self.address {
            if log.address != address {
                return false;
            }
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            Some(topic) => log.topics.get(i) == Some(topic),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(address: Address, topics: Vec<B256>) -> Log {
        Log {
            address,
            topics,
            data: Vec::new(),
            tx_hash: TxHash(B256::ZERO),
            block_number: 1,
        }
    }

    #[test]
    fn test_log_filter_positional_topics() {
        let emitter = Address::repeat_byte(0x11);
        let entry = log(emitter, vec![B256::repeat_byte(1), B256::repeat_byte(2)]);

        let any = LogFilter::default();
        assert!(any.matches(&entry));

        let by_second = LogFilter {
            address: Some(emitter),
            topics: vec![None, Some(B256::repeat_byte(2))],
        };
        assert!(by_second.matches(&entry));

        let wrong_emitter = LogFilter {
            address: Some(Address::repeat_byte(0x12)),
            topics: vec![],
        };
        assert!(!wrong_emitter.matches(&entry));

        let too_deep = LogFilter {
            address: None,
            topics: vec![None, None, Some(B256::repeat_byte(3))],
        };
        assert!(!too_deep.matches(&entry));
    }

    #[test]
    fn test_hash_covers_signature() {
        let tx = UnsignedTransaction {
            chain_id: 250,
            nonce: 0,
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            value: U256::ZERO,
            data: vec![0xde, 0xad],
        };
        let a = SignedTransaction {
            tx: tx.clone(),
            signature: vec![1u8; 64],
            public_key: vec![],
        };
        let b = SignedTransaction {
            tx,
            signature: vec![2u8; 64],
            public_key: vec![],
        };
        assert_ne!(a.hash(), b.hash());
        assert!(a.hash().to_string().starts_with("0x"));
    }
}

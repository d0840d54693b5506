//! Ledger access for timelock administration
//!
//! The [`Ledger`] trait is the seam between the timelock workflow and the
//! chain it drives. Production deployments implement it over an RPC client;
//! [`InMemoryLedger`] runs the timelock contract rules locally for tests and
//! dry runs.

pub mod memory;
pub mod types;

pub use memory::{InMemoryLedger, RecordedCall, GRACE_PERIOD, MAXIMUM_DELAY, MINIMUM_DELAY};
pub use types::*;

use crate::crypto::Address;
use crate::error::TimelockError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The call executed and the contract reverted with this reason.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The transaction was refused before execution (nonce, chain id, signature).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<LedgerError> for TimelockError {
    fn from(err: LedgerError) -> Self {
        TimelockError::Ledger(err.to_string())
    }
}

/// Abstraction over the ledger holding the timelock contract.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Timestamp of the latest block. All timelock comparisons use this
    /// clock, never the local wall clock.
    async fn block_timestamp(&self) -> Result<u64, LedgerError>;

    async fn nonce(&self, account: &Address) -> Result<u64, LedgerError>;

    /// Read-only call returning raw return data.
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, LedgerError>;

    /// Submits a signed transaction and returns its hash without waiting
    /// for inclusion.
    async fn broadcast(&self, tx: SignedTransaction) -> Result<TxHash, LedgerError>;

    /// The receipt of an included transaction, or `None` while it is pending.
    async fn receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, LedgerError>;

    /// Event logs matching `filter`, oldest first.
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, LedgerError>;
}

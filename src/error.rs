//! Error types for timelock administration

use crate::timelock::{TimelockState, TxIdentity};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TimelockError {
    /// The caller built a call that does not match the target's interface.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The contract name/address pair could not be resolved.
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Invalid eta {eta}: earliest permitted eta is {earliest}")]
    InvalidEta { eta: u64, earliest: u64 },

    /// No Queued/Executable record exists for this identity.
    #[error("Unknown transaction {identity}: {reason}")]
    UnknownTransaction { identity: TxIdentity, reason: String },

    #[error("Transaction {identity} is {state}; build a new transaction to retry")]
    TerminalState {
        identity: TxIdentity,
        state: TimelockState,
    },

    #[error("{action} submission rejected: {reason}")]
    SubmissionRejected { action: String, reason: String },

    /// Broadcast succeeded but no receipt arrived in time. The outcome is
    /// ambiguous until the ledger is queried again.
    #[error("Confirmation of {tx_hash} not observed within {}", format_wait(.waited))]
    ConfirmationTimeout { tx_hash: String, waited: Duration },

    #[error("Beneficiary does not match: expected {expected}, provided {provided}")]
    BeneficiaryMismatch { expected: String, provided: String },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl TimelockError {
    /// Whether resubmitting the same request could change the outcome
    /// without the caller first fixing its inputs or querying the ledger.
    pub fn is_retriable(&self) -> bool {
        matches!(self, TimelockError::Ledger(_))
    }
}

impl From<std::io::Error> for TimelockError {
    fn from(err: std::io::Error) -> Self {
        TimelockError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for TimelockError {
    fn from(err: toml::de::Error) -> Self {
        TimelockError::Config(err.to_string())
    }
}

fn format_wait(waited: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*waited)
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, TimelockError>;

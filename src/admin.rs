//! Administrative façades over the timelock workflow
//!
//! Each façade builds transactions for one administrative purpose and drives
//! them through the [`SubmissionAdapter`](crate::submission::SubmissionAdapter).
//! Whatever the outcome, the caller gets back the identity and state of the
//! transaction so it can be checked against the ledger.

pub mod masterchef;
pub mod prompt;
pub mod vesting;

pub use masterchef::{MasterChefAdmin, MasterChefCall, PoolInfo};
pub use prompt::{AutoConfirm, ConfirmPrompt, TerminalPrompt};
pub use vesting::{per_mille, VestingAdmin};

use crate::error::TimelockError;
use crate::ledger::ReceiptId;
use crate::timelock::{TimelockAction, TimelockState, TimelockTransaction, TxIdentity};

/// Report of one submitted action.
#[derive(Debug)]
pub struct AdminOutcome {
    pub action: TimelockAction,
    pub identity: TxIdentity,
    pub state: TimelockState,
    pub eta: u64,
    pub result: Result<ReceiptId, TimelockError>,
}

impl AdminOutcome {
    pub fn new(action: TimelockAction, tx: &TimelockTransaction, result: Result<ReceiptId, TimelockError>) -> Self {
        AdminOutcome {
            action,
            identity: tx.identity(),
            state: tx.state(),
            eta: tx.eta(),
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn receipt(&self) -> Option<ReceiptId> {
        self.result.as_ref().ok().copied()
    }

    pub fn into_result(self) -> Result<ReceiptId, TimelockError> {
        self.result
    }

    pub fn describe(&self) -> serde_json::Value {
        let mut report = serde_json::json!({
            "action": self.action.to_string(),
            "identity": self.identity.to_string(),
            "state": self.state.to_string(),
            "eta": self.eta,
        });
        match &self.result {
            Ok(receipt) => report["receipt"] = serde_json::Value::String(receipt.to_string()),
            Err(e) => report["error"] = serde_json::Value::String(e.to_string()),
        }
        report
    }
}

/// Timelock transaction descriptors and their builder
use crate::abi::Token;
use crate::contracts::TargetContract;
use crate::error::TimelockError;
use crate::ledger::{ReceiptId, GRACE_PERIOD, MINIMUM_DELAY};
use crate::timelock::encoding::{identity, CallEncoder};
use crate::timelock::state::{TimelockAction, TimelockState};
use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keccak-256 fingerprint of (target, value, payload, eta).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxIdentity(pub B256);

impl TxIdentity {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl fmt::Display for TxIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TxIdentity({})", self)
    }
}

/// A function name plus positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    pub function: String,
    pub args: Vec<Token>,
}

impl CallSpec {
    pub fn new(function: impl Into<String>, args: Vec<Token>) -> Self {
        CallSpec {
            function: function.into(),
            args,
        }
    }
}

/// Delay policy of the timelock contract, read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockPolicy {
    pub minimum_delay: u64,
    pub grace_period: u64,
}

impl TimelockPolicy {
    pub fn new(minimum_delay: u64, grace_period: u64) -> Self {
        TimelockPolicy {
            minimum_delay,
            grace_period,
        }
    }

    /// Earliest eta accepted at `now`.
    pub fn earliest_eta(&self, now: u64) -> Option<u64> {
        now.checked_add(self.minimum_delay)
    }

    /// Rejects `eta` earlier than `now + minimum_delay`.
    pub fn validate_eta(&self, now: u64, eta: u64) -> Result<(), TimelockError> {
        match self.earliest_eta(now) {
            Some(earliest) if eta >= earliest => Ok(()),
            Some(earliest) => Err(TimelockError::InvalidEta { eta, earliest }),
            None => Err(TimelockError::InvalidEta {
                eta,
                earliest: u64::MAX,
            }),
        }
    }
}

/// The bounds the in-memory timelock deploys with.
impl Default for TimelockPolicy {
    fn default() -> Self {
        TimelockPolicy::new(MINIMUM_DELAY, GRACE_PERIOD)
    }
}

/// A privileged call scheduled through the timelock.
///
/// Target, value, payload, eta and identity are fixed at construction. Only
/// the lifecycle state and the receipt log change, and never after a
/// terminal state.
#[derive(Debug, Clone)]
pub struct TimelockTransaction {
    target: TargetContract,
    value: U256,
    call: CallSpec,
    payload: Vec<u8>,
    eta: u64,
    identity: TxIdentity,
    state: TimelockState,
    receipts: Vec<(TimelockAction, ReceiptId)>,
}

impl TimelockTransaction {
    pub fn target(&self) -> &TargetContract {
        &self.target
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn call(&self) -> &CallSpec {
        &self.call
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn eta(&self) -> u64 {
        self.eta
    }

    pub fn identity(&self) -> TxIdentity {
        self.identity
    }

    pub fn state(&self) -> TimelockState {
        self.state
    }

    /// Confirmed receipts, oldest first.
    pub fn receipts(&self) -> &[(TimelockAction, ReceiptId)] {
        &self.receipts
    }

    /// Receipt of the most recent confirmed `action`, if any.
    pub fn receipt_for(&self, action: TimelockAction) -> Option<ReceiptId> {
        self.receipts
            .iter()
            .rev()
            .find(|(a, _)| *a == action)
            .map(|(_, receipt)| *receipt)
    }

    /// Whether `action` may be submitted from the current local state.
    pub fn check_action(&self, action: TimelockAction) -> Result<(), TimelockError> {
        match (action, self.state) {
            (TimelockAction::Queue, state) if state.is_terminal() => Err(TimelockError::TerminalState {
                identity: self.identity,
                state,
            }),
            (TimelockAction::Queue, _) => Ok(()),
            (_, state) if state.is_live() => Ok(()),
            (_, TimelockState::Pending) => Err(TimelockError::UnknownTransaction {
                identity: self.identity,
                reason: "transaction has not been queued".to_string(),
            }),
            (_, state) => Err(TimelockError::UnknownTransaction {
                identity: self.identity,
                reason: format!("transaction is {}", state),
            }),
        }
    }

    /// Advances Queued/Executable by ledger time and returns the new state.
    pub fn refresh(&mut self, now: u64, grace_period: u64) -> TimelockState {
        self.state = self.state.at_time(now, self.eta, grace_period);
        self.state
    }

    /// Records a ledger-confirmed `action`.
    pub(crate) fn confirm(&mut self, action: TimelockAction, receipt: ReceiptId) {
        if self.state.is_terminal() {
            return;
        }
        self.state = self.state.after(action);
        self.receipts.push((action, receipt));
    }

    /// Overwrites the local state from an authoritative ledger reading.
    pub(crate) fn set_state(&mut self, state: TimelockState) {
        self.state = state;
    }

    /// Adds a receipt observed on the ledger, skipping duplicates.
    pub(crate) fn record_receipt(&mut self, action: TimelockAction, receipt: ReceiptId) {
        if !self.receipts.contains(&(action, receipt)) {
            self.receipts.push((action, receipt));
        }
    }

    /// Operator-facing summary for reconciliation against the ledger.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "identity": self.identity.to_string(),
            "target": self.target.name(),
            "address": self.target.address().to_string(),
            "function": self.call.function,
            "value": self.value.to_string(),
            "eta": self.eta,
            "eta_utc": chrono::DateTime::from_timestamp(self.eta as i64, 0)
                .map(|t| t.to_rfc3339()),
            "state": self.state.to_string(),
        })
    }
}

/// Builds validated [`TimelockTransaction`]s.
#[derive(Debug, Clone)]
pub struct TimelockBuilder {
    encoder: CallEncoder,
    policy: TimelockPolicy,
}

impl TimelockBuilder {
    pub fn new(encoder: CallEncoder, policy: TimelockPolicy) -> Self {
        TimelockBuilder { encoder, policy }
    }

    pub fn encoder(&self) -> &CallEncoder {
        &self.encoder
    }

    pub fn policy(&self) -> &TimelockPolicy {
        &self.policy
    }

    /// Encodes `call` on `target` and checks `eta` against the delay policy
    /// at ledger time `now`. Pure given identical inputs.
    pub fn build(
        &self,
        now: u64,
        target: TargetContract,
        value: U256,
        call: CallSpec,
        eta: u64,
    ) -> Result<TimelockTransaction, TimelockError> {
        let payload = self.encoder.encode(&target, &call)?;
        self.policy.validate_eta(now, eta)?;

        let identity = identity(target.address(), value, &payload, eta);
        tracing::debug!(
            "Built {} on {} with eta {} as {}",
            call.function,
            target,
            eta,
            identity
        );

        Ok(TimelockTransaction {
            target,
            value,
            call,
            payload,
            eta,
            identity,
            state: TimelockState::Pending,
            receipts: Vec::new(),
        })
    }

    /// Rebuilds a descriptor for an already-scheduled transaction without
    /// the delay check, for reconciliation after a restart.
    pub fn restore(
        &self,
        target: TargetContract,
        value: U256,
        call: CallSpec,
        eta: u64,
    ) -> Result<TimelockTransaction, TimelockError> {
        let payload = self.encoder.encode(&target, &call)?;
        let identity = identity(target.address(), value, &payload, eta);
        Ok(TimelockTransaction {
            target,
            value,
            call,
            payload,
            eta,
            identity,
            state: TimelockState::Pending,
            receipts: Vec::new(),
        })
    }
}

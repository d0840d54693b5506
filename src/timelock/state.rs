/// Lifecycle states and actions of a timelock transaction
use crate::abi::ITimelock;
use alloy_primitives::B256;
use alloy_sol_types::SolEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locally mirrored state. The ledger's timelock contract is authoritative;
/// this copy lets callers reject doomed actions before a round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelockState {
    /// Constructed but not yet confirmed as queued.
    Pending,
    Queued,
    Executable,
    Executed,
    Cancelled,
    Expired,
}

impl TimelockState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TimelockState::Executed | TimelockState::Cancelled | TimelockState::Expired
        )
    }

    /// Queued or Executable: a record exists on the ledger.
    pub fn is_live(self) -> bool {
        matches!(self, TimelockState::Queued | TimelockState::Executable)
    }

    /// Applies the time-driven transitions. `eta` is inclusive; the grace
    /// window closes strictly after `eta + grace_period`.
    pub fn at_time(self, now: u64, eta: u64, grace_period: u64) -> Self {
        match self {
            TimelockState::Queued | TimelockState::Executable
                if now > eta.saturating_add(grace_period) =>
            {
                TimelockState::Expired
            }
            TimelockState::Queued if now >= eta => TimelockState::Executable,
            other => other,
        }
    }

    /// The state reached once `action` is confirmed by the ledger.
    pub fn after(self, action: TimelockAction) -> Self {
        match action {
            TimelockAction::Queue => TimelockState::Queued,
            TimelockAction::Execute => TimelockState::Executed,
            TimelockAction::Cancel => TimelockState::Cancelled,
        }
    }
}

impl fmt::Display for TimelockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            TimelockState::Pending => "pending",
            TimelockState::Queued => "queued",
            TimelockState::Executable => "executable",
            TimelockState::Executed => "executed",
            TimelockState::Cancelled => "cancelled",
            TimelockState::Expired => "expired",
        };
        f.write_str(label)
    }
}

/// A state transition requested of the timelock contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelockAction {
    Queue,
    Execute,
    Cancel,
}

impl TimelockAction {
    /// The timelock contract function carrying this action.
    pub fn function_name(self) -> &'static str {
        match self {
            TimelockAction::Queue => "queueTransaction",
            TimelockAction::Execute => "executeTransaction",
            TimelockAction::Cancel => "cancelTransaction",
        }
    }

    /// First topic of the event the timelock emits when this action lands.
    pub fn event_topic(self) -> B256 {
        match self {
            TimelockAction::Queue => ITimelock::QueueTransaction::SIGNATURE_HASH,
            TimelockAction::Execute => ITimelock::ExecuteTransaction::SIGNATURE_HASH,
            TimelockAction::Cancel => ITimelock::CancelTransaction::SIGNATURE_HASH,
        }
    }

    /// The action whose event carries `topic`, if any.
    pub fn from_event_topic(topic: &B256) -> Option<Self> {
        [TimelockAction::Queue, TimelockAction::Execute, TimelockAction::Cancel]
            .into_iter()
            .find(|action| action.event_topic() == *topic)
    }
}

impl fmt::Display for TimelockAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            TimelockAction::Queue => "queue",
            TimelockAction::Execute => "execute",
            TimelockAction::Cancel => "cancel",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_ignores_time() {
        assert_eq!(TimelockState::Pending.at_time(u64::MAX, 0, 0), TimelockState::Pending);
    }

    #[test]
    fn test_grace_window_saturates() {
        // eta + grace overflowing must not expire the transaction
        let state = TimelockState::Queued.at_time(u64::MAX, u64::MAX - 1, 10);
        assert_eq!(state, TimelockState::Executable);
    }

    #[test]
    fn test_event_topics_round_trip() {
        for action in [TimelockAction::Queue, TimelockAction::Execute, TimelockAction::Cancel] {
            assert_eq!(TimelockAction::from_event_topic(&action.event_topic()), Some(action));
        }
        assert_eq!(TimelockAction::from_event_topic(&B256::ZERO), None);
        assert_eq!(
            TimelockAction::Queue.event_topic(),
            crate::crypto::keccak256("QueueTransaction(bytes32,address,uint256,string,bytes,uint256)")
        );
    }

    #[test]
    fn test_after_actions() {
        assert_eq!(TimelockState::Pending.after(TimelockAction::Queue), TimelockState::Queued);
        assert_eq!(TimelockState::Executable.after(TimelockAction::Execute), TimelockState::Executed);
        assert_eq!(TimelockState::Queued.after(TimelockAction::Cancel), TimelockState::Cancelled);
        assert!(TimelockState::Cancelled.is_terminal());
        assert!(!TimelockState::Executable.is_terminal());
    }
}

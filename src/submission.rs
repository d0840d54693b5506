//! Submission of timelock transitions and direct calls to a ledger
//!
//! The [`SubmissionAdapter`] turns a requested [`TimelockAction`] into a
//! signed `queueTransaction`/`executeTransaction`/`cancelTransaction` call,
//! waits a bounded time for its receipt and maps the outcome back onto the
//! transaction's local state. Local state changes only on confirmed success.

use crate::abi::{ITimelock, Token};
use crate::config::{Config, LedgerConfig};
use crate::contracts::{TargetContract, TIMELOCK};
use crate::crypto::Address;
use crate::error::{Result, TimelockError};
use crate::ledger::{Ledger, LedgerError, Log, LogFilter, Receipt, ReceiptId, ReceiptStatus, TxHash, UnsignedTransaction};
use crate::signer::Signer;
use crate::timelock::{
    timelock_calldata, CallEncoder, CallSpec, TimelockAction, TimelockBuilder, TimelockPolicy, TimelockState,
    TimelockTransaction, TxIdentity,
};
use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Next nonce this adapter will use for one account. Holding the lock
/// covers nonce assignment through broadcast.
type NonceSlot = Arc<tokio::sync::Mutex<u64>>;

/// Result of a mined (or refused) submission.
enum Outcome {
    Confirmed(Receipt),
    Reverted { tx_hash: Option<TxHash>, reason: String },
}

pub struct SubmissionAdapter<L: Ledger> {
    ledger: Arc<L>,
    timelock: TargetContract,
    encoder: CallEncoder,
    policy: TimelockPolicy,
    signer_role: String,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    nonces: Mutex<HashMap<Address, NonceSlot>>,
}

impl<L: Ledger> SubmissionAdapter<L> {
    pub fn new(
        ledger: Arc<L>,
        timelock: TargetContract,
        encoder: CallEncoder,
        policy: TimelockPolicy,
        settings: &LedgerConfig,
    ) -> Self {
        SubmissionAdapter {
            ledger,
            timelock,
            encoder,
            policy,
            signer_role: settings.signer_role.clone(),
            confirmation_timeout: settings.confirmation_timeout(),
            poll_interval: settings.poll_interval(),
            nonces: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the timelock from `config`, checks the ledger's chain id and
    /// reads the delay policy from the deployed contract.
    pub async fn connect(ledger: Arc<L>, config: &Config) -> Result<Self> {
        let chain_id = ledger.chain_id().await?;
        if chain_id != config.ledger.chain_id {
            return Err(TimelockError::Config(format!(
                "Ledger reports chain {} but configuration targets {}",
                chain_id, config.ledger.chain_id
            )));
        }

        let timelock = config.active_network()?.resolve(TIMELOCK)?;
        let encoder = CallEncoder::new(Arc::new(config.interface_registry()?));
        let policy = read_policy(ledger.as_ref(), timelock.address()).await?;
        info!(
            "Connected to {} on chain {}: delay {}s, grace {}s",
            timelock, chain_id, policy.minimum_delay, policy.grace_period
        );

        Ok(Self::new(ledger, timelock, encoder, policy, &config.ledger))
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn timelock(&self) -> &TargetContract {
        &self.timelock
    }

    pub fn encoder(&self) -> &CallEncoder {
        &self.encoder
    }

    pub fn policy(&self) -> TimelockPolicy {
        self.policy
    }

    /// A builder sharing this adapter's interfaces and delay policy.
    pub fn builder(&self) -> TimelockBuilder {
        TimelockBuilder::new(self.encoder.clone(), self.policy)
    }

    /// Current ledger time.
    pub async fn now(&self) -> Result<u64> {
        Ok(self.ledger.block_timestamp().await?)
    }

    /// Read-only call on `target`, decoded against its interface.
    pub async fn read(&self, target: &TargetContract, call: &CallSpec) -> Result<Vec<Token>> {
        let data = self.encoder.encode(target, call)?;
        let output = self.ledger.call(&target.address(), &data).await?;
        self.encoder.decode_output(target, call, &output)
    }

    /// Whether the timelock holds a queued record under `identity`.
    pub async fn is_queued(&self, identity: TxIdentity) -> Result<bool> {
        let call = ITimelock::queuedTransactionsCall { txHash: identity.0 };
        let queued = view(self.ledger.as_ref(), self.timelock.address(), &call).await?;
        Ok(queued._0)
    }

    /// Drives one transition of `tx` through the timelock.
    ///
    /// Queue is idempotent: if the ledger already holds the record, the
    /// original queue receipt is returned without broadcasting.
    pub async fn submit(
        &self,
        signer: &dyn Signer,
        tx: &mut TimelockTransaction,
        action: TimelockAction,
    ) -> Result<ReceiptId> {
        let now = self.now().await?;
        let state = tx.refresh(now, self.policy.grace_period);
        tx.check_action(action)?;
        if signer.role() != self.signer_role {
            warn!(
                "Signer {} has role '{}', the timelock expects '{}'",
                signer.address(),
                signer.role(),
                self.signer_role
            );
        }
        info!(
            "Submitting {} for {} ({}, eta {}, ledger time {})",
            action,
            tx.identity(),
            state,
            tx.eta(),
            now
        );

        if action == TimelockAction::Queue {
            if self.is_queued(tx.identity()).await? {
                let receipt = self.adopt_existing_queue(tx, now).await?;
                info!("{} already queued, no broadcast", tx.identity());
                return Ok(receipt);
            }
            if state.is_live() {
                // The ledger dropped a record we believed live.
                let reconciled = self.reconcile(tx).await?;
                if reconciled.is_terminal() {
                    return Err(TimelockError::TerminalState {
                        identity: tx.identity(),
                        state: reconciled,
                    });
                }
            }
        }

        let data = timelock_calldata(action, tx.target().address(), tx.value(), tx.payload(), tx.eta());
        let value = match action {
            TimelockAction::Execute => tx.value(),
            TimelockAction::Queue | TimelockAction::Cancel => U256::ZERO,
        };

        match self.send(signer, self.timelock.address(), value, data).await? {
            Outcome::Confirmed(receipt) => {
                tx.confirm(action, receipt.tx_hash);
                info!(
                    "{} of {} confirmed in block {} ({}), now {}",
                    action,
                    tx.identity(),
                    receipt.block_number,
                    receipt.tx_hash,
                    tx.state()
                );
                Ok(receipt.tx_hash)
            }
            Outcome::Reverted { tx_hash, reason } => {
                warn!(
                    "{} of {} reverted ({}): {}",
                    action,
                    tx.identity(),
                    tx_hash.map(|h| h.to_string()).unwrap_or_else(|| "not mined".to_string()),
                    reason
                );
                self.map_revert(tx, action, now, reason).await
            }
        }
    }

    /// Signs and confirms a plain call on `target`, bypassing the timelock.
    pub async fn submit_direct(
        &self,
        signer: &dyn Signer,
        target: &TargetContract,
        call: &CallSpec,
        value: U256,
    ) -> Result<ReceiptId> {
        let data = self.encoder.encode(target, call)?;
        info!("Submitting {} on {} directly", call.function, target);

        match self.send(signer, target.address(), value, data).await? {
            Outcome::Confirmed(receipt) => {
                info!("{} on {} confirmed ({})", call.function, target, receipt.tx_hash);
                Ok(receipt.tx_hash)
            }
            Outcome::Reverted { reason, .. } => {
                warn!("{} on {} reverted: {}", call.function, target, reason);
                Err(TimelockError::SubmissionRejected {
                    action: call.function.clone(),
                    reason,
                })
            }
        }
    }

    /// Rebuilds the local state of `tx` from the timelock's event history
    /// and ledger time. The ledger wins over whatever was held locally.
    pub async fn reconcile(&self, tx: &mut TimelockTransaction) -> Result<TimelockState> {
        let now = self.now().await?;
        let events = self.events_for(tx.identity()).await?;
        let previous = tx.state();

        let state = match events.last() {
            Some((action, tx_hash)) => {
                tx.record_receipt(*action, *tx_hash);
                TimelockState::Pending
                    .after(*action)
                    .at_time(now, tx.eta(), self.policy.grace_period)
            }
            None => TimelockState::Pending,
        };
        tx.set_state(state);

        if previous != state {
            info!("Reconciled {}: {} -> {}", tx.identity(), previous, state);
        } else {
            debug!("Reconciled {}: still {}", tx.identity(), state);
        }
        Ok(state)
    }

    /// Timelock events for `identity`, oldest first.
    async fn events_for(&self, identity: TxIdentity) -> Result<Vec<(TimelockAction, TxHash)>> {
        let filter = LogFilter {
            address: Some(self.timelock.address()),
            topics: vec![None, Some(identity.0)],
        };
        let logs = self.ledger.logs(&filter).await?;
        Ok(logs
            .iter()
            .filter_map(|log| event_action(log).map(|action| (action, log.tx_hash)))
            .collect())
    }

    /// Records an existing queued record on `tx` and returns its receipt.
    async fn adopt_existing_queue(&self, tx: &mut TimelockTransaction, now: u64) -> Result<ReceiptId> {
        let receipt = match tx.receipt_for(TimelockAction::Queue) {
            Some(receipt) => receipt,
            None => self
                .events_for(tx.identity())
                .await?
                .into_iter()
                .rev()
                .find(|(action, _)| *action == TimelockAction::Queue)
                .map(|(_, tx_hash)| tx_hash)
                .ok_or_else(|| {
                    TimelockError::Ledger(format!("{} is queued but no queue event was found", tx.identity()))
                })?,
        };

        if tx.state() == TimelockState::Pending {
            tx.confirm(TimelockAction::Queue, receipt);
            tx.refresh(now, self.policy.grace_period);
        }
        Ok(receipt)
    }

    async fn map_revert(
        &self,
        tx: &mut TimelockTransaction,
        action: TimelockAction,
        now: u64,
        reason: String,
    ) -> Result<ReceiptId> {
        if action == TimelockAction::Queue && reason.contains("already queued") {
            return self.adopt_existing_queue(tx, now).await;
        }
        if reason.contains("hasn't been queued") {
            return Err(TimelockError::UnknownTransaction {
                identity: tx.identity(),
                reason,
            });
        }
        Err(TimelockError::SubmissionRejected {
            action: action.to_string(),
            reason,
        })
    }

    fn nonce_slot(&self, account: Address) -> NonceSlot {
        self.nonces.lock().entry(account).or_default().clone()
    }

    async fn send(&self, signer: &dyn Signer, to: Address, value: U256, data: Vec<u8>) -> Result<Outcome> {
        let from = signer.address();
        let chain_id = self.ledger.chain_id().await?;

        // Transactions from one account are numbered and broadcast one at a time.
        let slot = self.nonce_slot(from);
        let mut next_nonce = slot.lock().await;
        let nonce = self.ledger.nonce(&from).await?.max(*next_nonce);
        let unsigned = UnsignedTransaction {
            chain_id,
            nonce,
            from,
            to,
            value,
            data,
        };
        let signed = signer.sign_transaction(unsigned)?;

        let tx_hash = match self.ledger.broadcast(signed).await {
            Ok(tx_hash) => tx_hash,
            Err(LedgerError::Reverted(reason)) | Err(LedgerError::Rejected(reason)) => {
                return Ok(Outcome::Reverted { tx_hash: None, reason });
            }
            Err(e) => return Err(e.into()),
        };
        *next_nonce = nonce + 1;
        drop(next_nonce);
        debug!("Broadcast {} from {} to {} with nonce {}", tx_hash, from, to, nonce);

        let receipt = self.await_receipt(tx_hash).await?;
        match receipt.status {
            ReceiptStatus::Success => Ok(Outcome::Confirmed(receipt)),
            ReceiptStatus::Reverted(reason) => Ok(Outcome::Reverted {
                tx_hash: Some(tx_hash),
                reason,
            }),
        }
    }

    /// Polls for the receipt of a broadcast transaction. Once broadcast the
    /// outcome is ambiguous, so lookup failures are retried until the wait
    /// runs out and then reported as [`TimelockError::ConfirmationTimeout`].
    async fn await_receipt(&self, tx_hash: TxHash) -> Result<Receipt> {
        let poll = async {
            loop {
                match self.ledger.receipt(&tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!("Receipt lookup for {} failed, retrying: {}", tx_hash, e),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.confirmation_timeout, poll).await {
            Ok(receipt) => Ok(receipt),
            Err(_) => {
                warn!("No receipt for {} after {:?}", tx_hash, self.confirmation_timeout);
                Err(TimelockError::ConfirmationTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited: self.confirmation_timeout,
                })
            }
        }
    }
}

/// Read-only typed call on the timelock at `to`.
async fn view<L: Ledger + ?Sized, C: SolCall>(ledger: &L, to: Address, call: &C) -> Result<C::Return> {
    let output = ledger.call(&to, &call.abi_encode()).await?;
    C::abi_decode_returns(&output, true)
        .map_err(|e| TimelockError::Ledger(format!("{} returned malformed data: {}", C::SIGNATURE, e)))
}

/// Reads `delay()` and `GRACE_PERIOD()` from the deployed timelock.
async fn read_policy<L: Ledger + ?Sized>(ledger: &L, timelock: Address) -> Result<TimelockPolicy> {
    let delay = view(ledger, timelock, &ITimelock::delayCall {}).await?._0;
    let grace = view(ledger, timelock, &ITimelock::GRACE_PERIODCall {}).await?._0;
    let as_seconds = |value: U256, name: &str| {
        u64::try_from(value).map_err(|_| TimelockError::Ledger(format!("{}() does not fit in seconds: {}", name, value)))
    };
    Ok(TimelockPolicy::new(as_seconds(delay, "delay")?, as_seconds(grace, "GRACE_PERIOD")?))
}

fn event_action(log: &Log) -> Option<TimelockAction> {
    TimelockAction::from_event_topic(log.topics.first()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy_primitives::B256;

    #[test]
    fn test_event_action_by_topic() {
        let log = |topics: Vec<B256>| Log {
            address: Address::repeat_byte(0x7a),
            topics,
            data: vec![],
            tx_hash: TxHash(B256::ZERO),
            block_number: 1,
        };

        for action in [TimelockAction::Queue, TimelockAction::Execute, TimelockAction::Cancel] {
            assert_eq!(event_action(&log(vec![action.event_topic()])), Some(action));
        }
        assert_eq!(event_action(&log(vec![B256::ZERO])), None);
        assert_eq!(event_action(&log(vec![])), None);
    }
}

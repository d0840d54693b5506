/// In-memory ledger running the timelock contract rules locally
use crate::abi::ITimelock::ITimelockCalls;
use crate::crypto::{keccak256, verify_signature, Address};
use crate::ledger::types::{
    Log, LogFilter, Receipt, ReceiptStatus, SignedTransaction, TxHash, UnsignedTransaction,
};
use crate::ledger::{Ledger, LedgerError};
use crate::timelock::TimelockAction;
use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Six hours: the shortest delay the timelock accepts at deployment.
pub const MINIMUM_DELAY: u64 = 6 * 60 * 60;
/// Thirty days: the longest delay the timelock accepts at deployment.
pub const MAXIMUM_DELAY: u64 = 30 * 24 * 60 * 60;
/// Fourteen days after eta during which execution is still accepted.
pub const GRACE_PERIOD: u64 = 14 * 24 * 60 * 60;

/// Arguments of a queue, execute or cancel call.
struct TimelockCall {
    action: TimelockAction,
    target: Address,
    value: U256,
    signature: String,
    data: Bytes,
    eta: U256,
}

impl TimelockCall {
    fn decode(calldata: &[u8]) -> Result<Self, String> {
        let call = ITimelockCalls::abi_decode(calldata, true).map_err(|e| format!("Timelock: {}", e))?;
        let (action, target, value, signature, data, eta) = match call {
            ITimelockCalls::queueTransaction(c) => (TimelockAction::Queue, c.target, c.value, c.signature, c.data, c.eta),
            ITimelockCalls::executeTransaction(c) => {
                (TimelockAction::Execute, c.target, c.value, c.signature, c.data, c.eta)
            }
            ITimelockCalls::cancelTransaction(c) => {
                (TimelockAction::Cancel, c.target, c.value, c.signature, c.data, c.eta)
            }
            _ => return Err("Timelock: not a transaction function".to_string()),
        };
        Ok(TimelockCall {
            action,
            target,
            value,
            signature,
            data,
            eta,
        })
    }

    /// `keccak256(abi.encode(target, value, signature, data, eta))`
    fn key(&self) -> B256 {
        keccak256((self.target, self.value, self.signature.clone(), self.data.clone(), self.eta).abi_encode_params())
    }

    fn event_data(&self) -> Vec<u8> {
        (self.value, self.signature.clone(), self.data.clone(), self.eta).abi_encode_params()
    }
}

/// A call that reached a non-timelock contract, either directly from an
/// account or forwarded by a timelock on execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub sender: Address,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub block_number: u64,
}

#[derive(Debug, Clone)]
struct TimelockContract {
    admin: Address,
    delay: u64,
    grace_period: u64,
    queued: HashSet<B256>,
}

impl TimelockContract {
    fn view(&self, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let call = ITimelockCalls::abi_decode(data, true)
            .map_err(|e| LedgerError::Reverted(format!("Timelock: {}", e)))?;
        let output = match call {
            ITimelockCalls::queuedTransactions(c) => self.queued.contains(&c.txHash).abi_encode(),
            ITimelockCalls::delay(_) => U256::from(self.delay).abi_encode(),
            ITimelockCalls::GRACE_PERIOD(_) => U256::from(self.grace_period).abi_encode(),
            ITimelockCalls::admin(_) => self.admin.abi_encode(),
            _ => return Err(LedgerError::Reverted("Timelock: not a view".to_string())),
        };
        Ok(output)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    chain_id: u64,
    timestamp: u64,
    block_number: u64,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, Receipt>,
    withheld: HashMap<TxHash, Receipt>,
    withhold_receipts: bool,
    logs: Vec<Log>,
    timelocks: HashMap<Address, TimelockContract>,
    views: HashMap<(Address, Vec<u8>), Vec<u8>>,
    reverts: HashMap<Address, String>,
    calls: Vec<RecordedCall>,
}

impl LedgerState {
    fn execute(&mut self, tx: &UnsignedTransaction, hash: TxHash) -> Result<Vec<Log>, String> {
        if self.timelocks.contains_key(&tx.to) {
            return self.execute_timelock(tx, hash);
        }
        if let Some(reason) = self.reverts.get(&tx.to) {
            return Err(reason.clone());
        }
        self.calls.push(RecordedCall {
            sender: tx.from,
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            block_number: self.block_number,
        });
        Ok(Vec::new())
    }

    fn execute_timelock(&mut self, tx: &UnsignedTransaction, hash: TxHash) -> Result<Vec<Log>, String> {
        let call = TimelockCall::decode(&tx.data)?;
        let action = call.action;
        let prefix = format!("Timelock::{}", action.function_name());
        let key = call.key();
        let eta = u64::try_from(call.eta).unwrap_or(u64::MAX);

        let (admin, delay, grace_period, queued) = match self.timelocks.get(&tx.to) {
            Some(contract) => (
                contract.admin,
                contract.delay,
                contract.grace_period,
                contract.queued.contains(&key),
            ),
            None => return Err("Timelock: not deployed".to_string()),
        };

        if tx.from != admin {
            return Err(format!("{}: Call must come from admin.", prefix));
        }

        let now = self.timestamp;
        match action {
            TimelockAction::Queue => {
                if eta < now.saturating_add(delay) {
                    return Err(format!("{}: Estimated execution block must satisfy delay.", prefix));
                }
                if queued {
                    return Err(format!("{}: Transaction already queued.", prefix));
                }
            }
            TimelockAction::Cancel => {
                if !queued {
                    return Err(format!("{}: Transaction hasn't been queued.", prefix));
                }
            }
            TimelockAction::Execute => {
                if !queued {
                    return Err(format!("{}: Transaction hasn't been queued.", prefix));
                }
                if now < eta {
                    return Err(format!("{}: Transaction hasn't surpassed time lock.", prefix));
                }
                if now > eta.saturating_add(grace_period) {
                    return Err(format!("{}: Transaction is stale.", prefix));
                }
                if self.reverts.contains_key(&call.target) {
                    return Err(format!("{}: Transaction execution reverted.", prefix));
                }
            }
        }

        if let Some(contract) = self.timelocks.get_mut(&tx.to) {
            match action {
                TimelockAction::Queue => {
                    contract.queued.insert(key);
                }
                TimelockAction::Execute | TimelockAction::Cancel => {
                    contract.queued.remove(&key);
                }
            }
        }

        if action == TimelockAction::Execute {
            let mut forwarded = Vec::with_capacity(4 + call.data.len());
            if !call.signature.is_empty() {
                forwarded.extend_from_slice(&keccak256(call.signature.as_bytes())[..4]);
            }
            forwarded.extend_from_slice(&call.data);
            self.calls.push(RecordedCall {
                sender: tx.to,
                to: call.target,
                value: call.value,
                data: forwarded,
                block_number: self.block_number,
            });
        }

        Ok(vec![Log {
            address: tx.to,
            topics: vec![action.event_topic(), key, call.target.into_word()],
            data: call.event_data(),
            tx_hash: hash,
            block_number: self.block_number,
        }])
    }
}

/// A single-node ledger whose clock only moves when told to.
///
/// Every broadcast is mined immediately into its own block at the current
/// timestamp. Timelock contracts deployed with [`deploy_timelock`] enforce
/// admin, delay, grace and queue-membership rules and emit the usual
/// queue/execute/cancel events. Any other address accepts calls and records
/// them, unless a revert reason was registered for it.
///
/// [`deploy_timelock`]: InMemoryLedger::deploy_timelock
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(chain_id: u64, timestamp: u64) -> Self {
        InMemoryLedger {
            state: Mutex::new(LedgerState {
                chain_id,
                timestamp,
                ..LedgerState::default()
            }),
        }
    }

    pub fn deploy_timelock(&self, address: Address, admin: Address, delay: u64) -> Result<(), LedgerError> {
        if delay < MINIMUM_DELAY {
            return Err(LedgerError::Reverted(
                "Timelock::constructor: Delay must exceed minimum delay.".to_string(),
            ));
        }
        if delay > MAXIMUM_DELAY {
            return Err(LedgerError::Reverted(
                "Timelock::constructor: Delay must not exceed maximum delay.".to_string(),
            ));
        }
        self.state.lock().timelocks.insert(
            address,
            TimelockContract {
                admin,
                delay,
                grace_period: GRACE_PERIOD,
                queued: HashSet::new(),
            },
        );
        Ok(())
    }

    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    pub fn set_timestamp(&self, timestamp: u64) {
        self.state.lock().timestamp = timestamp;
    }

    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock();
        state.timestamp = state.timestamp.saturating_add(seconds);
    }

    /// Fixed return data for a read-only call on a non-timelock contract.
    pub fn set_view(&self, to: Address, calldata: Vec<u8>, output: Vec<u8>) {
        self.state.lock().views.insert((to, calldata), output);
    }

    /// Makes every call reaching `to` revert with `reason`.
    pub fn set_revert(&self, to: Address, reason: impl Into<String>) {
        self.state.lock().reverts.insert(to, reason.into());
    }

    /// While set, mined transactions keep their receipts back until
    /// [`release_receipts`](Self::release_receipts).
    pub fn withhold_receipts(&self, withhold: bool) {
        self.state.lock().withhold_receipts = withhold;
    }

    pub fn release_receipts(&self) {
        let mut state = self.state.lock();
        let withheld: Vec<_> = state.withheld.drain().collect();
        state.receipts.extend(withheld);
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn queued_count(&self, timelock: &Address) -> usize {
        self.state
            .lock()
            .timelocks
            .get(timelock)
            .map(|contract| contract.queued.len())
            .unwrap_or(0)
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().chain_id)
    }

    async fn block_timestamp(&self) -> Result<u64, LedgerError> {
        Ok(self.timestamp())
    }

    async fn nonce(&self, account: &Address) -> Result<u64, LedgerError> {
        Ok(self.state.lock().nonces.get(account).copied().unwrap_or(0))
    }

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let state = self.state.lock();
        if let Some(contract) = state.timelocks.get(to) {
            return contract.view(data);
        }
        state
            .views
            .get(&(*to, data.to_vec()))
            .cloned()
            .ok_or_else(|| {
                LedgerError::Reverted(format!(
                    "no view registered for 0x{} on {}",
                    hex::encode(&data[..data.len().min(4)]),
                    to
                ))
            })
    }

    async fn broadcast(&self, signed: SignedTransaction) -> Result<TxHash, LedgerError> {
        let sender = verify_signature(&signed.public_key, &signed.tx.signable_message(), &signed.signature)
            .map_err(|e| LedgerError::Rejected(e.to_string()))?;
        if sender != signed.tx.from {
            return Err(LedgerError::Rejected(format!(
                "signature recovers {} but transaction is from {}",
                sender, signed.tx.from
            )));
        }

        let mut state = self.state.lock();
        if signed.tx.chain_id != state.chain_id {
            return Err(LedgerError::Rejected(format!(
                "chain id {} does not match {}",
                signed.tx.chain_id, state.chain_id
            )));
        }
        let expected = state.nonces.get(&sender).copied().unwrap_or(0);
        if signed.tx.nonce != expected {
            return Err(LedgerError::Rejected(format!(
                "nonce {} does not match expected {}",
                signed.tx.nonce, expected
            )));
        }
        state.nonces.insert(sender, expected + 1);
        state.block_number += 1;

        let hash = signed.hash();
        let (status, logs) = match state.execute(&signed.tx, hash) {
            Ok(logs) => (ReceiptStatus::Success, logs),
            Err(reason) => (ReceiptStatus::Reverted(reason), Vec::new()),
        };
        state.logs.extend(logs.iter().cloned());

        let receipt = Receipt {
            tx_hash: hash,
            block_number: state.block_number,
            timestamp: state.timestamp,
            status,
            logs,
        };
        debug!("Mined {} in block {}: {:?}", hash, receipt.block_number, receipt.status);

        if state.withhold_receipts {
            state.withheld.insert(hash, receipt);
        } else {
            state.receipts.insert(hash, receipt);
        }
        Ok(hash)
    }

    async fn receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, LedgerError> {
        Ok(self.state.lock().receipts.get(hash).cloned())
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, LedgerError> {
        Ok(self
            .state
            .lock()
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::signer::{LocalSigner, Signer};
    use crate::timelock::{identity, timelock_calldata};
    use crate::abi::ITimelock;
    use alloy_sol_types::SolCall;

    const START: u64 = 1_700_000_000;

    fn setup() -> (InMemoryLedger, LocalSigner, Address) {
        let ledger = InMemoryLedger::new(250, START);
        let admin = LocalSigner::new(KeyPair::generate().unwrap(), "admin");
        let timelock = Address::repeat_byte(0x7a);
        ledger.deploy_timelock(timelock, admin.address(), MINIMUM_DELAY).unwrap();
        (ledger, admin, timelock)
    }

    fn queue_call(target: Address, eta: u64) -> Vec<u8> {
        timelock_calldata(TimelockAction::Queue, target, U256::ZERO, &[0xaa, 0xbb], eta)
    }

    async fn send(ledger: &InMemoryLedger, signer: &LocalSigner, to: Address, data: Vec<u8>) -> Receipt {
        let tx = UnsignedTransaction {
            chain_id: 250,
            nonce: ledger.nonce(&signer.address()).await.unwrap(),
            from: signer.address(),
            to,
            value: U256::ZERO,
            data,
        };
        let hash = ledger.broadcast(signer.sign_transaction(tx).unwrap()).await.unwrap();
        ledger.receipt(&hash).await.unwrap().unwrap()
    }

    #[test]
    fn test_deploy_enforces_delay_bounds() {
        let ledger = InMemoryLedger::new(250, START);
        assert!(ledger.deploy_timelock(Address::repeat_byte(1), Address::repeat_byte(2), MINIMUM_DELAY - 1).is_err());
        assert!(ledger.deploy_timelock(Address::repeat_byte(1), Address::repeat_byte(2), MAXIMUM_DELAY + 1).is_err());
        assert!(ledger.deploy_timelock(Address::repeat_byte(1), Address::repeat_byte(2), MAXIMUM_DELAY).is_ok());
    }

    #[tokio::test]
    async fn test_queue_records_identity_and_event() {
        let (ledger, admin, timelock) = setup();
        let target = Address::repeat_byte(0x81);
        let eta = START + MINIMUM_DELAY;

        let receipt = send(&ledger, &admin, timelock, queue_call(target, eta)).await;
        assert!(receipt.is_success());
        assert_eq!(ledger.queued_count(&timelock), 1);

        let key = identity(target, U256::ZERO, &[0xaa, 0xbb], eta);
        assert_eq!(receipt.logs[0].topics[0], TimelockAction::Queue.event_topic());
        assert_eq!(receipt.logs[0].topics[1], key.0);
        assert_eq!(receipt.logs[0].topics[2], target.into_word());

        let view = ITimelock::queuedTransactionsCall { txHash: key.0 }.abi_encode();
        let output = ledger.call(&timelock, &view).await.unwrap();
        assert!(ITimelock::queuedTransactionsCall::abi_decode_returns(&output, true).unwrap()._0);
    }

    #[tokio::test]
    async fn test_second_queue_reverts_as_already_queued() {
        let (ledger, admin, timelock) = setup();
        let target = Address::repeat_byte(0x81);
        let eta = START + MINIMUM_DELAY;

        assert!(send(&ledger, &admin, timelock, queue_call(target, eta)).await.is_success());
        let again = send(&ledger, &admin, timelock, queue_call(target, eta)).await;
        assert_eq!(
            again.status,
            ReceiptStatus::Reverted("Timelock::queueTransaction: Transaction already queued.".to_string())
        );
        assert_eq!(ledger.queued_count(&timelock), 1);
    }

    #[tokio::test]
    async fn test_policy_views() {
        let (ledger, admin, timelock) = setup();
        let delay = ledger.call(&timelock, &ITimelock::delayCall {}.abi_encode()).await.unwrap();
        assert_eq!(
            ITimelock::delayCall::abi_decode_returns(&delay, true).unwrap()._0,
            U256::from(MINIMUM_DELAY)
        );
        let owner = ledger.call(&timelock, &ITimelock::adminCall {}.abi_encode()).await.unwrap();
        assert_eq!(ITimelock::adminCall::abi_decode_returns(&owner, true).unwrap()._0, admin.address());
    }

    #[test]
    fn test_default_policy_matches_deploy_bounds() {
        let policy = crate::timelock::TimelockPolicy::default();
        assert_eq!(policy.minimum_delay, MINIMUM_DELAY);
        assert_eq!(policy.grace_period, GRACE_PERIOD);

        let ledger = InMemoryLedger::new(250, START);
        let admin = Address::repeat_byte(0xad);
        assert!(ledger.deploy_timelock(Address::repeat_byte(1), admin, MINIMUM_DELAY - 1).is_err());
        assert!(ledger.deploy_timelock(Address::repeat_byte(2), admin, MAXIMUM_DELAY + 1).is_err());
        assert!(ledger.deploy_timelock(Address::repeat_byte(3), admin, MAXIMUM_DELAY).is_ok());
    }

    #[tokio::test]
    async fn test_timelock_reverts_carry_reasons() {
        let (ledger, admin, timelock) = setup();
        let target = Address::repeat_byte(0x81);

        let early = send(&ledger, &admin, timelock, queue_call(target, START + MINIMUM_DELAY - 1)).await;
        assert_eq!(
            early.status,
            ReceiptStatus::Reverted(
                "Timelock::queueTransaction: Estimated execution block must satisfy delay.".to_string()
            )
        );

        let stranger = LocalSigner::new(KeyPair::generate().unwrap(), "admin");
        let denied = send(&ledger, &stranger, timelock, queue_call(target, START + MINIMUM_DELAY)).await;
        assert_eq!(
            denied.status,
            ReceiptStatus::Reverted("Timelock::queueTransaction: Call must come from admin.".to_string())
        );
        assert_eq!(ledger.queued_count(&timelock), 0);
    }

    #[tokio::test]
    async fn test_broadcast_rejects_bad_nonce_and_chain() {
        let (ledger, admin, timelock) = setup();
        let mut tx = UnsignedTransaction {
            chain_id: 4,
            nonce: 0,
            from: admin.address(),
            to: timelock,
            value: U256::ZERO,
            data: vec![],
        };
        let wrong_chain = ledger.broadcast(admin.sign_transaction(tx.clone()).unwrap()).await;
        assert!(matches!(wrong_chain, Err(LedgerError::Rejected(_))));

        tx.chain_id = 250;
        tx.nonce = 3;
        let wrong_nonce = ledger.broadcast(admin.sign_transaction(tx).unwrap()).await;
        assert!(matches!(wrong_nonce, Err(LedgerError::Rejected(_))));
        assert_eq!(ledger.block_number(), 0);
    }

    #[tokio::test]
    async fn test_withheld_receipts_are_released() {
        let (ledger, admin, _) = setup();
        ledger.withhold_receipts(true);
        let tx = UnsignedTransaction {
            chain_id: 250,
            nonce: 0,
            from: admin.address(),
            to: Address::repeat_byte(0x33),
            value: U256::ZERO,
            data: vec![0x01],
        };
        let hash = ledger.broadcast(admin.sign_transaction(tx).unwrap()).await.unwrap();
        assert!(ledger.receipt(&hash).await.unwrap().is_none());

        ledger.release_receipts();
        assert!(ledger.receipt(&hash).await.unwrap().unwrap().is_success());
        assert_eq!(ledger.recorded_calls().len(), 1);
    }
}

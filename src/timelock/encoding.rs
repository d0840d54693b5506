/// Call encoding and identity fingerprints for timelock transactions
use crate::abi::{self, ITimelock, Token};
use crate::contracts::{InterfaceRegistry, TargetContract};
use crate::crypto::{keccak256, Address};
use crate::error::TimelockError;
use crate::timelock::state::TimelockAction;
use crate::timelock::types::{CallSpec, TxIdentity};
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use std::sync::Arc;

/// Encodes calls against the interface metadata of their target.
#[derive(Debug, Clone)]
pub struct CallEncoder {
    registry: Arc<InterfaceRegistry>,
}

impl CallEncoder {
    pub fn new(registry: Arc<InterfaceRegistry>) -> Self {
        CallEncoder { registry }
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Selector plus encoded arguments for `call` on `target`.
    pub fn encode(&self, target: &TargetContract, call: &CallSpec) -> Result<Vec<u8>, TimelockError> {
        let interface = self.registry.interface_for(target)?;
        let function = interface.function_for(&call.function, &call.args)?;
        abi::encode_call(function, &call.args)
    }

    /// Decodes the return data of a read-only `call` on `target`.
    pub fn decode_output(
        &self,
        target: &TargetContract,
        call: &CallSpec,
        output: &[u8],
    ) -> Result<Vec<Token>, TimelockError> {
        let interface = self.registry.interface_for(target)?;
        let function = interface.function_for(&call.function, &call.args)?;
        abi::decode_output(function, output)
    }
}

/// Calldata of `queueTransaction`, `executeTransaction` or
/// `cancelTransaction`. The signature slot stays empty because the payload
/// already carries the selector.
pub fn timelock_calldata(action: TimelockAction, target: Address, value: U256, payload: &[u8], eta: u64) -> Vec<u8> {
    let signature = String::new();
    let data = Bytes::copy_from_slice(payload);
    let eta = U256::from(eta);
    match action {
        TimelockAction::Queue => ITimelock::queueTransactionCall {
            target,
            value,
            signature,
            data,
            eta,
        }
        .abi_encode(),
        TimelockAction::Execute => ITimelock::executeTransactionCall {
            target,
            value,
            signature,
            data,
            eta,
        }
        .abi_encode(),
        TimelockAction::Cancel => ITimelock::cancelTransactionCall {
            target,
            value,
            signature,
            data,
            eta,
        }
        .abi_encode(),
    }
}

/// Fingerprint of (target, value, payload, eta). Equal to the key under
/// which the timelock contract records the queued transaction.
pub fn identity(target: Address, value: U256, payload: &[u8], eta: u64) -> TxIdentity {
    let encoded = (target, value, String::new(), Bytes::copy_from_slice(payload), U256::from(eta)).abi_encode_params();
    TxIdentity(keccak256(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{parse_function, uint};
    use crate::contracts::MASTER_CHEF;

    #[test]
    fn test_encode_resolves_through_registry() {
        let encoder = CallEncoder::new(Arc::new(InterfaceRegistry::with_defaults().unwrap()));
        let chef = TargetContract::new(MASTER_CHEF, Address::repeat_byte(0x81));
        let call = CallSpec::new(
            "set",
            vec![uint(3u64), uint(250u64), Token::Address(Address::ZERO), Token::Bool(false)],
        );

        let payload = encoder.encode(&chef, &call).unwrap();
        let set = parse_function("set(uint256,uint256,address,bool)").unwrap();
        assert_eq!(&payload[..4], set.selector().as_slice());
        assert_eq!(payload.len(), 4 + 4 * 32);
    }

    #[test]
    fn test_identity_is_keccak_of_queued_arguments() {
        let target = Address::repeat_byte(0x81);
        let payload = [0x01, 0x02, 0x03];
        let calldata = timelock_calldata(TimelockAction::Queue, target, U256::ZERO, &payload, 42);

        // the timelock hashes exactly the arguments that follow the selector
        assert_eq!(identity(target, U256::ZERO, &payload, 42).0, keccak256(&calldata[4..]));
    }

    #[test]
    fn test_actions_share_arguments_but_not_selectors() {
        let target = Address::repeat_byte(0x81);
        let queue = timelock_calldata(TimelockAction::Queue, target, U256::ZERO, &[0xaa], 7);
        let execute = timelock_calldata(TimelockAction::Execute, target, U256::ZERO, &[0xaa], 7);
        assert_ne!(queue[..4], execute[..4]);
        assert_eq!(queue[4..], execute[4..]);
        assert_eq!(&queue[..4], ITimelock::queueTransactionCall::SELECTOR.as_slice());
    }
}

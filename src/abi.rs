//! Contract ABI: typed timelock bindings and signature-driven call encoding
//!
//! The timelock's own surface is fixed, so it is declared once with
//! [`sol!`]. Reward-chef, vesting and token calls are resolved at runtime from
//! human-readable signatures (built in or configured), so they go through
//! [`alloy_dyn_abi`] values checked against the parsed [`Function`].

use crate::error::TimelockError;
use alloy_dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy_primitives::{Address, U256};
use alloy_sol_types::sol;

pub use alloy_dyn_abi::DynSolValue as Token;
pub use alloy_json_abi::Function;

sol! {
    /// Compound-style timelock administered by a single admin account.
    interface ITimelock {
        event QueueTransaction(bytes32 indexed txHash, address indexed target, uint256 value, string signature, bytes data, uint256 eta);
        event CancelTransaction(bytes32 indexed txHash, address indexed target, uint256 value, string signature, bytes data, uint256 eta);
        event ExecuteTransaction(bytes32 indexed txHash, address indexed target, uint256 value, string signature, bytes data, uint256 eta);

        function queueTransaction(address target, uint256 value, string signature, bytes data, uint256 eta) external returns (bytes32);
        function cancelTransaction(address target, uint256 value, string signature, bytes data, uint256 eta) external;
        function executeTransaction(address target, uint256 value, string signature, bytes data, uint256 eta) external payable returns (bytes);

        function queuedTransactions(bytes32 txHash) external view returns (bool);
        function delay() external view returns (uint256);
        function GRACE_PERIOD() external view returns (uint256);
        function admin() external view returns (address);
    }
}

/// A `uint256` argument.
pub fn uint<T>(value: T) -> Token
where
    U256: alloy_primitives::ruint::UintTryFrom<T>,
{
    DynSolValue::Uint(U256::from(value), 256)
}

/// Parses `name(type name, ...)` with an optional ` returns (...)` suffix.
pub fn parse_function(signature: &str) -> Result<Function, TimelockError> {
    Function::parse(signature.trim())
        .map_err(|e| TimelockError::Encoding(format!("Malformed function signature '{}': {}", signature, e)))
}

/// `args` re-tagged with the declared input types, or `None` when the count
/// differs or a value does not fit its parameter.
pub fn coerce_inputs(function: &Function, args: &[Token]) -> Option<Vec<Token>> {
    if args.len() != function.inputs.len() {
        return None;
    }
    function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| param.resolve().ok().and_then(|ty| coerce(&ty, arg)))
        .collect()
}

fn coerce(ty: &DynSolType, value: &Token) -> Option<Token> {
    match (ty, value) {
        (DynSolType::Uint(bits), DynSolValue::Uint(v, _)) if v.bit_len() <= *bits => {
            Some(DynSolValue::Uint(*v, *bits))
        }
        (DynSolType::Array(inner), DynSolValue::Array(items)) => items
            .iter()
            .map(|item| coerce(inner, item))
            .collect::<Option<Vec<_>>>()
            .map(DynSolValue::Array),
        _ if ty.matches(value) => Some(value.clone()),
        _ => None,
    }
}

/// Selector followed by the encoded arguments, after checking `args`
/// against the declared inputs.
pub fn encode_call(function: &Function, args: &[Token]) -> Result<Vec<u8>, TimelockError> {
    let coerced = coerce_inputs(function, args).ok_or_else(|| {
        TimelockError::Encoding(format!(
            "Arguments {:?} do not fit {}",
            args,
            function.signature()
        ))
    })?;
    function
        .abi_encode_input(&coerced)
        .map_err(|e| TimelockError::Encoding(format!("{}: {}", function.signature(), e)))
}

/// Decodes the return data of a read-only `function`.
pub fn decode_output(function: &Function, output: &[u8]) -> Result<Vec<Token>, TimelockError> {
    function
        .abi_decode_output(output, true)
        .map_err(|e| TimelockError::Encoding(format!("Malformed return data of {}: {}", function.signature(), e)))
}

/// The `uint` returned at `index` by `function`.
pub fn output_uint(values: &[Token], index: usize, function: &str) -> Result<U256, TimelockError> {
    values
        .get(index)
        .and_then(Token::as_uint)
        .map(|(value, _)| value)
        .ok_or_else(|| TimelockError::Ledger(format!("{} returned no uint at position {}", function, index)))
}

/// The address returned at `index` by `function`.
pub fn output_address(values: &[Token], index: usize, function: &str) -> Result<Address, TimelockError> {
    values
        .get(index)
        .and_then(Token::as_address)
        .ok_or_else(|| TimelockError::Ledger(format!("{} returned no address at position {}", function, index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;

    #[test]
    fn test_named_signature_is_canonicalized() {
        let set = parse_function("set(uint256 _pid, uint256 _allocPoint, address _rewarder, bool overwrite)").unwrap();
        assert_eq!(set.signature(), "set(uint256,uint256,address,bool)");
        assert!(set.outputs.is_empty());

        let view = parse_function("poolInfo(uint256 pid) returns (uint256 allocPoint, uint256 lastRewardBlock, uint256 accBeetsPerShare)").unwrap();
        assert_eq!(view.outputs.len(), 3);
    }

    #[test]
    fn test_known_selectors() {
        let transfer = parse_function("transfer(address,uint256)").unwrap();
        assert_eq!(hex::encode(transfer.selector()), "a9059cbb");
        let approve = parse_function("approve(address spender, uint256 amount) returns (bool)").unwrap();
        assert_eq!(hex::encode(approve.selector()), "095ea7b3");
        assert!(parse_function("noParens").is_err());
    }

    #[test]
    fn test_static_call_layout() {
        let update = parse_function("updateEmissionRate(uint256)").unwrap();
        let payload = encode_call(&update, &[uint(5_050_000_000_000_000u64)]).unwrap();
        assert_eq!(payload.len(), 4 + 32);
        assert_eq!(&payload[..4], update.selector().as_slice());
        assert_eq!(hex::encode(&payload[4..]), format!("{:064x}", 5_050_000_000_000_000u64));
    }

    #[test]
    fn test_arguments_must_fit_declared_types() {
        let narrow = parse_function("setFee(uint8)").unwrap();
        assert!(encode_call(&narrow, &[uint(255u64)]).is_ok());
        assert!(encode_call(&narrow, &[uint(256u64)]).is_err());

        let add = parse_function("add(uint256,address,address)").unwrap();
        assert!(matches!(encode_call(&add, &[uint(1u64)]), Err(TimelockError::Encoding(_))));
        let treasury = parse_function("treasury(address)").unwrap();
        assert!(encode_call(&treasury, &[DynSolValue::Bool(false)]).is_err());
    }

    #[test]
    fn test_dynamic_signature_matches_typed_binding() {
        let queue = parse_function(
            "queueTransaction(address target, uint256 value, string signature, bytes data, uint256 eta) returns (bytes32)",
        )
        .unwrap();
        let target = Address::repeat_byte(0xab);
        let dynamic = encode_call(
            &queue,
            &[
                DynSolValue::Address(target),
                uint(0u64),
                DynSolValue::String(String::new()),
                DynSolValue::Bytes(vec![0x12, 0x34]),
                uint(1_700_021_600u64),
            ],
        )
        .unwrap();

        let typed = ITimelock::queueTransactionCall {
            target,
            value: U256::ZERO,
            signature: String::new(),
            data: vec![0x12, 0x34].into(),
            eta: U256::from(1_700_021_600u64),
        }
        .abi_encode();
        assert_eq!(dynamic, typed);
    }

    #[test]
    fn test_decode_multiple_outputs() {
        let user_info = parse_function("userInfo(uint256 pid, address user) returns (uint256 amount, uint256 rewardDebt)").unwrap();
        let mut output = U256::from(1_000u64).to_be_bytes::<32>().to_vec();
        output.extend_from_slice(&U256::from(7u64).to_be_bytes::<32>());

        let values = decode_output(&user_info, &output).unwrap();
        assert_eq!(values, vec![uint(1_000u64), uint(7u64)]);
        assert_eq!(output_uint(&values, 1, "userInfo").unwrap(), U256::from(7u64));
        assert!(output_address(&values, 0, "userInfo").is_err());
        assert!(output_uint(&values, 2, "userInfo").is_err());
        assert!(decode_output(&user_info, &output[..32]).is_err());
    }
}

//! Contract targets and interface metadata
//!
//! A [`TargetContract`] pairs a configured contract name with its resolved
//! ledger address. The [`InterfaceRegistry`] knows which functions each named
//! interface exposes, so calls can be checked before they are encoded.

use crate::abi::{self, Function, Token};
use crate::crypto::Address;
use crate::error::TimelockError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const MASTER_CHEF: &str = "MasterChef";
pub const TIMELOCK: &str = "Timelock";
pub const LP_TOKEN_TIMELOCK: &str = "MasterChefLpTokenTimelock";
pub const ERC20: &str = "ERC20";

/// A resolved contract: configured name plus ledger address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetContract {
    name: String,
    interface: String,
    address: Address,
}

impl TargetContract {
    /// A target whose interface shares its name (e.g. `MasterChef`).
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        let name = name.into();
        TargetContract {
            interface: name.clone(),
            name,
            address,
        }
    }

    pub fn with_interface(name: impl Into<String>, interface: impl Into<String>, address: Address) -> Self {
        TargetContract {
            name: name.into(),
            interface: interface.into(),
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Display for TargetContract {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// The callable surface of one contract interface.
#[derive(Debug, Clone, Default)]
pub struct ContractInterface {
    functions: Vec<Function>,
}

impl ContractInterface {
    pub fn from_signatures<S: AsRef<str>>(signatures: &[S]) -> Result<Self, TimelockError> {
        let functions = signatures
            .iter()
            .map(|sig| abi::parse_function(sig.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ContractInterface { functions })
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Looks up `name`, resolving overloads by argument count and type.
    pub fn function_for(&self, name: &str, args: &[Token]) -> Result<&Function, TimelockError> {
        let mut candidates = self.functions.iter().filter(|f| f.name == name).peekable();
        if candidates.peek().is_none() {
            return Err(TimelockError::Encoding(format!(
                "Interface has no function named '{}'",
                name
            )));
        }

        let candidates: Vec<&Function> = candidates.collect();
        if let Some(function) = candidates.iter().find(|f| abi::coerce_inputs(f, args).is_some()) {
            return Ok(*function);
        }

        let expected = candidates
            .iter()
            .map(|f| f.signature())
            .collect::<Vec<_>>()
            .join(" | ");
        Err(TimelockError::Encoding(format!(
            "Arguments {:?} do not match {}",
            args, expected
        )))
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Interface metadata keyed by interface name.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    interfaces: HashMap<String, ContractInterface>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the reward-chef, vesting and ERC20 interfaces
    /// this crate drives. The timelock itself is bound statically in
    /// [`abi::ITimelock`].
    pub fn with_defaults() -> Result<Self, TimelockError> {
        let mut registry = Self::new();
        registry.register(
            MASTER_CHEF,
            ContractInterface::from_signatures(&[
                "add(uint256 _allocPoint, address _lpToken, address _rewarder)",
                "set(uint256 _pid, uint256 _allocPoint, address _rewarder, bool overwrite)",
                "updateEmissionRate(uint256 _beetsPerBlock)",
                "treasury(address _treasuryAddress)",
                "owner() returns (address)",
                "transferOwnership(address newOwner)",
                "poolLength() returns (uint256)",
                "poolInfo(uint256 pid) returns (uint256 allocPoint, uint256 lastRewardBlock, uint256 accBeetsPerShare)",
                "lpTokens(uint256 pid) returns (address)",
                "userInfo(uint256 pid, address user) returns (uint256 amount, uint256 rewardDebt)",
            ])?,
        );
        registry.register(
            LP_TOKEN_TIMELOCK,
            ContractInterface::from_signatures(&[
                "beneficiary() returns (address)",
                "depositAllToMasterChef(uint256 amount)",
            ])?,
        );
        registry.register(
            ERC20,
            ContractInterface::from_signatures(&[
                "approve(address spender, uint256 amount) returns (bool)",
                "balanceOf(address account) returns (uint256)",
                "transfer(address to, uint256 amount) returns (bool)",
            ])?,
        );
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, interface: ContractInterface) {
        self.interfaces.insert(name.into(), interface);
    }

    /// Interface metadata for a resolved target.
    pub fn interface_for(&self, target: &TargetContract) -> Result<&ContractInterface, TimelockError> {
        if target.address().is_zero() {
            return Err(TimelockError::UnknownTarget(format!(
                "{} has no resolved address",
                target.name()
            )));
        }
        self.interfaces.get(target.interface()).ok_or_else(|| {
            TimelockError::UnknownTarget(format!(
                "No interface metadata for {} (interface '{}')",
                target.name(),
                target.interface()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::uint;

    fn chef() -> TargetContract {
        TargetContract::new(MASTER_CHEF, Address::repeat_byte(0x81))
    }

    #[test]
    fn test_defaults_expose_admin_functions() {
        let registry = InterfaceRegistry::with_defaults().unwrap();
        let interface = registry.interface_for(&chef()).unwrap();
        for name in ["add", "set", "updateEmissionRate", "treasury", "transferOwnership", "poolInfo"] {
            assert!(interface.function(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_unresolved_address_is_unknown_target() {
        let registry = InterfaceRegistry::with_defaults().unwrap();
        let target = TargetContract::new(MASTER_CHEF, Address::ZERO);
        assert!(matches!(
            registry.interface_for(&target),
            Err(TimelockError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_unregistered_interface_is_unknown_target() {
        let registry = InterfaceRegistry::with_defaults().unwrap();
        let target = TargetContract::new("Rewarder", Address::repeat_byte(1));
        assert!(matches!(
            registry.interface_for(&target),
            Err(TimelockError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_overload_resolution_by_arguments() {
        let interface = ContractInterface::from_signatures(&[
            "deposit(uint256)",
            "deposit(uint256,address)",
        ])
        .unwrap();
        let with_to = interface
            .function_for("deposit", &[uint(1u64), Token::Address(Address::repeat_byte(2))])
            .unwrap();
        assert_eq!(with_to.signature(), "deposit(uint256,address)");

        let err = interface.function_for("deposit", &[Token::Bool(true)]).unwrap_err();
        assert!(err.to_string().contains("deposit(uint256) | deposit(uint256,address)"));
    }
}

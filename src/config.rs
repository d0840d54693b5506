//! Configuration management for timelock administration
//!
//! Configuration is loaded once at process start and passed by reference to
//! every component that resolves contract addresses. Nothing here is global.

use crate::contracts::{ContractInterface, InterfaceRegistry, TargetContract};
use crate::crypto::Address;
use crate::error::TimelockError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Contract tables keyed by network (chain) id.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Extra interfaces as lists of function signatures, keyed by interface name.
    #[serde(default)]
    pub interfaces: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_signer_role")]
    pub signer_role: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            poll_interval_ms: default_poll_interval(),
            signer_role: default_signer_role(),
        }
    }
}

impl LedgerConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractEntry>,
}

/// Either a bare address or an address with an explicit interface name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContractEntry {
    Address(String),
    Detailed {
        address: String,
        #[serde(default)]
        interface: Option<String>,
    },
}

impl ContractEntry {
    fn address(&self) -> &str {
        match self {
            ContractEntry::Address(address) => address,
            ContractEntry::Detailed { address, .. } => address,
        }
    }

    fn interface(&self) -> Option<&str> {
        match self {
            ContractEntry::Address(_) => None,
            ContractEntry::Detailed { interface, .. } => interface.as_deref(),
        }
    }
}

impl NetworkConfig {
    /// Resolves a configured contract name to a target. Missing or empty
    /// entries are unresolved.
    pub fn resolve(&self, name: &str) -> Result<TargetContract, TimelockError> {
        let entry = self.contracts.get(name).ok_or_else(|| {
            TimelockError::UnknownTarget(format!(
                "{} is not configured on network {}",
                name,
                self.label()
            ))
        })?;

        if entry.address().trim().is_empty() {
            return Err(TimelockError::UnknownTarget(format!(
                "{} has no address on network {}",
                name,
                self.label()
            )));
        }

        let address = entry.address().trim().parse::<Address>().map_err(|e| {
            TimelockError::Config(format!("Invalid address for {}: {}", name, e))
        })?;

        Ok(match entry.interface() {
            Some(interface) => TargetContract::with_interface(name, interface, address),
            None => TargetContract::new(name, address),
        })
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, TimelockError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise surface as confusing runtime errors.
    pub fn validate(&self) -> Result<(), TimelockError> {
        if self.ledger.confirmation_timeout_secs == 0 {
            return Err(TimelockError::Config(
                "ledger.confirmation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.ledger.poll_interval_ms == 0 {
            return Err(TimelockError::Config(
                "ledger.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.ledger.signer_role.trim().is_empty() {
            return Err(TimelockError::Config(
                "ledger.signer_role must be set".to_string(),
            ));
        }
        for key in self.networks.keys() {
            key.parse::<u64>().map_err(|_| {
                TimelockError::Config(format!("Network key '{}' is not a chain id", key))
            })?;
        }
        Ok(())
    }

    pub fn network(&self, chain_id: u64) -> Result<&NetworkConfig, TimelockError> {
        self.networks.get(&chain_id.to_string()).ok_or_else(|| {
            TimelockError::Config(format!("No contracts configured for network {}", chain_id))
        })
    }

    /// The network selected by `ledger.chain_id`.
    pub fn active_network(&self) -> Result<&NetworkConfig, TimelockError> {
        self.network(self.ledger.chain_id)
    }

    /// Built-in interfaces plus those declared under `[interfaces]`.
    pub fn interface_registry(&self) -> Result<InterfaceRegistry, TimelockError> {
        let mut registry = InterfaceRegistry::with_defaults()?;
        for (name, signatures) in &self.interfaces {
            registry.register(name.clone(), ContractInterface::from_signatures(signatures.as_slice())?);
        }
        Ok(registry)
    }
}

/// Loads `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, TimelockError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!("{} not found, using default configuration", path.display());
        return Ok(Config::default());
    }
    let source = fs::read_to_string(path)?;
    Config::from_toml_str(&source)
}

fn default_chain_id() -> u64 {
    250
}

fn default_confirmation_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_signer_role() -> String {
    "admin".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimelockError;
    use std::io::Write;

    const SAMPLE: &str = r#"
[ledger]
chain_id = 250
confirmation_timeout_secs = 30

[networks.250]
name = "opera"

[networks.250.contracts]
MasterChef = "0x8166994d9ebBe5829EC86Bd81258149B87faCfd3"
Timelock = "0xb5caee3cd5d86c138f879b3abc5b1bebb63c6471"
BeethovenxToken = ""
CialLp = { address = "0xF3af4de70e1afb4E998BEa88177CdF31BDab5b69", interface = "ERC20" }

[interfaces]
Rewarder = ["setRewardPerSecond(uint256)"]
"#;

    #[test]
    fn test_resolve_configured_contracts() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let network = config.active_network().unwrap();

        let chef = network.resolve("MasterChef").unwrap();
        assert_eq!(chef.name(), "MasterChef");
        assert_eq!(chef.interface(), "MasterChef");

        let timelock = network.resolve("Timelock").unwrap();
        assert_eq!(timelock.address().to_string(), "0xB5CaEe3CD5d86c138f879B3abC5B1bebB63c6471");

        let lp = network.resolve("CialLp").unwrap();
        assert_eq!(lp.interface(), "ERC20");
    }

    #[test]
    fn test_empty_and_missing_entries_are_unknown_targets() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let network = config.network(250).unwrap();
        assert!(matches!(
            network.resolve("BeethovenxToken"),
            Err(TimelockError::UnknownTarget(msg)) if msg.contains("no address")
        ));
        assert!(matches!(
            network.resolve("Vesting"),
            Err(TimelockError::UnknownTarget(msg)) if msg.contains("not configured")
        ));
    }

    #[test]
    fn test_defaults_and_durations() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.ledger.confirmation_timeout(), Duration::from_secs(30));
        assert_eq!(config.ledger.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.ledger.signer_role, "admin");
        assert!(config.network(4).is_err());
    }

    #[test]
    fn test_custom_interfaces_registered() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let registry = config.interface_registry().unwrap();
        let rewarder = TargetContract::new("Rewarder", Address::repeat_byte(3));
        assert!(registry.interface_for(&rewarder).is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml_str(include_str!("../config.example.toml")).unwrap();
        assert!(config.active_network().unwrap().resolve("Timelock").is_ok());
        assert!(matches!(
            config.network(4).unwrap().resolve("Timelock"),
            Err(TimelockError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = Config::from_toml_str("[ledger]\nconfirmation_timeout_secs = 0\n");
        assert!(matches!(result, Err(TimelockError::Config(_))));
    }

    #[test]
    fn test_load_config_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timelock.toml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.network(250).is_ok());

        let fallback = load_config(dir.path().join("absent.toml")).unwrap();
        assert!(fallback.networks.is_empty());
        assert_eq!(fallback.ledger.chain_id, 250);
    }
}

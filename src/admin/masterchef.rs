/// Reward-chef administration: pools, emission rate, treasury and ownership
use crate::abi::{output_address, output_uint, uint, Token};
use crate::admin::AdminOutcome;
use crate::config::NetworkConfig;
use crate::contracts::{TargetContract, MASTER_CHEF};
use crate::crypto::Address;
use crate::error::{Result, TimelockError};
use crate::ledger::{Ledger, ReceiptId};
use crate::signer::Signer;
use crate::submission::SubmissionAdapter;
use crate::timelock::{CallSpec, TimelockAction, TimelockTransaction};
use alloy_primitives::U256;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Privileged MasterChef calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterChefCall {
    AddPool {
        alloc_point: u64,
        lp_token: Address,
        rewarder: Address,
    },
    SetPool {
        pid: u64,
        alloc_point: u64,
        rewarder: Address,
        overwrite: bool,
    },
    UpdateEmissionRate { per_block: U256 },
    SetTreasury { treasury: Address },
}

impl MasterChefCall {
    pub fn to_call_spec(&self) -> CallSpec {
        match self {
            MasterChefCall::AddPool {
                alloc_point,
                lp_token,
                rewarder,
            } => CallSpec::new(
                "add",
                vec![uint(*alloc_point), Token::Address(*lp_token), Token::Address(*rewarder)],
            ),
            MasterChefCall::SetPool {
                pid,
                alloc_point,
                rewarder,
                overwrite,
            } => CallSpec::new(
                "set",
                vec![uint(*pid), uint(*alloc_point), Token::Address(*rewarder), Token::Bool(*overwrite)],
            ),
            MasterChefCall::UpdateEmissionRate { per_block } => {
                CallSpec::new("updateEmissionRate", vec![uint(*per_block)])
            }
            MasterChefCall::SetTreasury { treasury } => CallSpec::new("treasury", vec![Token::Address(*treasury)]),
        }
    }
}

/// One reward pool as reported by the chef.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolInfo {
    pub pid: u64,
    pub lp_token: Address,
    pub alloc_point: U256,
    pub last_reward_block: U256,
    pub acc_reward_per_share: U256,
}

pub struct MasterChefAdmin<L: Ledger> {
    adapter: Arc<SubmissionAdapter<L>>,
    chef: TargetContract,
    signer: Arc<dyn Signer>,
}

impl<L: Ledger> MasterChefAdmin<L> {
    pub fn new(adapter: Arc<SubmissionAdapter<L>>, chef: TargetContract, signer: Arc<dyn Signer>) -> Self {
        MasterChefAdmin { adapter, chef, signer }
    }

    /// Resolves the chef address from `network`.
    pub fn from_network(
        adapter: Arc<SubmissionAdapter<L>>,
        network: &NetworkConfig,
        signer: Arc<dyn Signer>,
    ) -> Result<Self> {
        Ok(Self::new(adapter, network.resolve(MASTER_CHEF)?, signer))
    }

    pub fn chef(&self) -> &TargetContract {
        &self.chef
    }

    /// Builds a timelocked `call` for `eta`, validated at current ledger time.
    pub async fn schedule(&self, call: &MasterChefCall, eta: u64) -> Result<TimelockTransaction> {
        let now = self.adapter.now().await?;
        self.adapter
            .builder()
            .build(now, self.chef.clone(), U256::ZERO, call.to_call_spec(), eta)
    }

    /// Builds and queues `call`. Build errors are returned directly; the
    /// outcome of the queue submission is reported in the [`AdminOutcome`].
    pub async fn queue(&self, call: &MasterChefCall, eta: u64) -> Result<(TimelockTransaction, AdminOutcome)> {
        let mut tx = self.schedule(call, eta).await?;
        let outcome = self.drive(&mut tx, TimelockAction::Queue).await;
        Ok((tx, outcome))
    }

    /// Submits `action` for `tx` and reports identity and state either way.
    pub async fn drive(&self, tx: &mut TimelockTransaction, action: TimelockAction) -> AdminOutcome {
        let result = self.adapter.submit(self.signer.as_ref(), tx, action).await;
        let outcome = AdminOutcome::new(action, tx, result);
        match &outcome.result {
            Ok(receipt) => info!(
                "{} {} on {}: {} ({})",
                action,
                tx.call().function,
                self.chef,
                outcome.state,
                receipt
            ),
            Err(e) => warn!(
                "{} {} on {} failed, transaction {} is {}: {}",
                action,
                tx.call().function,
                self.chef,
                outcome.identity,
                outcome.state,
                e
            ),
        }
        outcome
    }

    /// Calls the chef without the timelock, for use while the operator
    /// still owns it.
    pub async fn call_directly(&self, call: &MasterChefCall) -> Result<ReceiptId> {
        self.adapter
            .submit_direct(self.signer.as_ref(), &self.chef, &call.to_call_spec(), U256::ZERO)
            .await
    }

    async fn read(&self, function: &str, args: Vec<Token>) -> Result<Vec<Token>> {
        self.adapter.read(&self.chef, &CallSpec::new(function, args)).await
    }

    pub async fn owner(&self) -> Result<Address> {
        output_address(&self.read("owner", vec![]).await?, 0, "owner")
    }

    /// Every pool the chef knows, in pid order.
    pub async fn pools(&self) -> Result<Vec<PoolInfo>> {
        let length = output_uint(&self.read("poolLength", vec![]).await?, 0, "poolLength")?;
        let length = u64::try_from(length)
            .map_err(|_| TimelockError::Ledger(format!("poolLength() is implausibly large: {}", length)))?;

        let mut pools = Vec::new();
        for pid in 0..length {
            let info = self.read("poolInfo", vec![uint(pid)]).await?;
            let lp_token = output_address(&self.read("lpTokens", vec![uint(pid)]).await?, 0, "lpTokens")?;
            let pool = PoolInfo {
                pid,
                lp_token,
                alloc_point: output_uint(&info, 0, "poolInfo")?,
                last_reward_block: output_uint(&info, 1, "poolInfo")?,
                acc_reward_per_share: output_uint(&info, 2, "poolInfo")?,
            };
            debug!("Pool {}: {:?}", pid, pool);
            pools.push(pool);
        }
        Ok(pools)
    }

    /// Hands the chef to the timelock unless the timelock already owns it.
    /// Returns the transfer receipt, or `None` when nothing was sent. Once
    /// this lands, privileged chef calls only succeed through the timelock.
    pub async fn transfer_ownership_to_timelock(&self) -> Result<Option<ReceiptId>> {
        let timelock = self.adapter.timelock().address();
        let owner = self.owner().await?;
        if owner == timelock {
            info!("{} is already owned by the timelock {}", self.chef, timelock);
            return Ok(None);
        }

        info!("Transferring ownership of {} from {} to the timelock {}", self.chef, owner, timelock);
        let call = CallSpec::new("transferOwnership", vec![Token::Address(timelock)]);
        let receipt = self
            .adapter
            .submit_direct(self.signer.as_ref(), &self.chef, &call, U256::ZERO)
            .await?;
        Ok(Some(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::InterfaceRegistry;
    use crate::timelock::CallEncoder;

    #[test]
    fn test_calls_encode_against_chef_interface() {
        let encoder = CallEncoder::new(Arc::new(InterfaceRegistry::with_defaults().unwrap()));
        let chef = TargetContract::new(MASTER_CHEF, Address::repeat_byte(0x81));
        let calls = [
            MasterChefCall::AddPool {
                alloc_point: 100,
                lp_token: Address::repeat_byte(0x0a),
                rewarder: Address::ZERO,
            },
            MasterChefCall::SetPool {
                pid: 2,
                alloc_point: 0,
                rewarder: Address::ZERO,
                overwrite: false,
            },
            MasterChefCall::UpdateEmissionRate {
                per_block: U256::from(5_050_000_000_000_000u64),
            },
            MasterChefCall::SetTreasury {
                treasury: Address::repeat_byte(0x0c),
            },
        ];

        for call in &calls {
            let payload = encoder.encode(&chef, &call.to_call_spec()).unwrap();
            assert_eq!((payload.len() - 4) % 32, 0);
        }
    }
}

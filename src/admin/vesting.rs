/// LP vesting deposits, submitted directly without the timelock
use crate::abi::{output_address, output_uint, uint, Token};
use crate::admin::prompt::ConfirmPrompt;
use crate::config::NetworkConfig;
use crate::contracts::{TargetContract, ERC20, LP_TOKEN_TIMELOCK, MASTER_CHEF};
use crate::crypto::Address;
use crate::error::{Result, TimelockError};
use crate::ledger::{Ledger, ReceiptId};
use crate::signer::Signer;
use crate::submission::SubmissionAdapter;
use crate::timelock::CallSpec;
use alloy_primitives::U256;
use std::sync::Arc;
use tracing::info;

/// `value * parts / 1000`, e.g. `per_mille(x, 125)` is 12.5% of `x`.
pub fn per_mille(value: U256, parts: u64) -> Result<U256> {
    value
        .checked_mul(U256::from(parts))
        .map(|scaled| scaled / U256::from(1000u64))
        .ok_or_else(|| TimelockError::Encoding(format!("{} per mille of {} overflows", parts, value)))
}

pub struct VestingAdmin<L: Ledger> {
    adapter: Arc<SubmissionAdapter<L>>,
    lp_token: TargetContract,
    chef: TargetContract,
    funds: Arc<dyn Signer>,
    prompt: Arc<dyn ConfirmPrompt>,
}

impl<L: Ledger> VestingAdmin<L> {
    /// `funds` holds the LP tokens to be vested. `chef` is the reward chef
    /// the vesting contracts deposit into.
    pub fn new(
        adapter: Arc<SubmissionAdapter<L>>,
        lp_token: Address,
        chef: Address,
        funds: Arc<dyn Signer>,
        prompt: Arc<dyn ConfirmPrompt>,
    ) -> Self {
        VestingAdmin {
            adapter,
            lp_token: TargetContract::with_interface("LpToken", ERC20, lp_token),
            chef: TargetContract::new(MASTER_CHEF, chef),
            funds,
            prompt,
        }
    }

    /// Resolves the LP token named `lp_name` (e.g. `CialLp`) and the reward
    /// chef from `network`.
    pub fn from_network(
        adapter: Arc<SubmissionAdapter<L>>,
        network: &NetworkConfig,
        lp_name: &str,
        funds: Arc<dyn Signer>,
        prompt: Arc<dyn ConfirmPrompt>,
    ) -> Result<Self> {
        let lp_token = network.resolve(lp_name)?;
        let chef = network.resolve(MASTER_CHEF)?;
        Ok(Self::new(adapter, lp_token.address(), chef.address(), funds, prompt))
    }

    pub async fn lp_balance(&self, holder: Address) -> Result<U256> {
        let call = CallSpec::new("balanceOf", vec![Token::Address(holder)]);
        output_uint(&self.adapter.read(&self.lp_token, &call).await?, 0, "balanceOf")
    }

    /// LP the `vesting` contract holds staked in pool 0 of the chef.
    pub async fn vested_amount(&self, vesting: Address) -> Result<U256> {
        let call = CallSpec::new("userInfo", vec![uint(0u64), Token::Address(vesting)]);
        output_uint(&self.adapter.read(&self.chef, &call).await?, 0, "userInfo")
    }

    /// The funding account's LP balance and `parts` per mille of it.
    pub async fn share_of_funds(&self, parts: u64) -> Result<(U256, U256)> {
        let total = self.lp_balance(self.funds.address()).await?;
        let share = per_mille(total, parts)?;
        info!("Total {}, {}.{}%: {}", total, parts / 10, parts % 10, share);
        Ok((total, share))
    }

    /// Approves and deposits `amount` LP into `vesting` for `beneficiary`.
    ///
    /// The vesting contract's recorded beneficiary must match. Returns
    /// `Ok(None)` when the operator declines; nothing is broadcast then.
    pub async fn deposit(&self, vesting: Address, amount: U256, beneficiary: Address) -> Result<Option<ReceiptId>> {
        let vesting = TargetContract::new(LP_TOKEN_TIMELOCK, vesting);
        let actual = output_address(
            &self.adapter.read(&vesting, &CallSpec::new("beneficiary", vec![])).await?,
            0,
            "beneficiary",
        )?;

        if actual != beneficiary {
            return Err(TimelockError::BeneficiaryMismatch {
                expected: actual.to_string(),
                provided: beneficiary.to_string(),
            });
        }

        if !self.prompt.confirm(&format!("Deposit {} for {}?", amount, beneficiary))? {
            info!("Deposit of {} into {} declined", amount, vesting);
            return Ok(None);
        }

        let approve = CallSpec::new("approve", vec![Token::Address(vesting.address()), uint(amount)]);
        self.adapter
            .submit_direct(self.funds.as_ref(), &self.lp_token, &approve, U256::ZERO)
            .await?;

        let deposit = CallSpec::new("depositAllToMasterChef", vec![uint(amount)]);
        let receipt = self
            .adapter
            .submit_direct(self.funds.as_ref(), &vesting, &deposit, U256::ZERO)
            .await?;
        info!("Deposited {} into {} for {} ({})", amount, vesting, beneficiary, receipt);
        Ok(Some(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_mille() {
        assert_eq!(per_mille(U256::from(2000u64), 125).unwrap(), U256::from(250u64));
        assert_eq!(per_mille(U256::from(999u64), 1).unwrap(), U256::ZERO);
        assert!(per_mille(U256::MAX, 2).is_err());
    }
}

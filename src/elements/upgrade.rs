use std::path::Path;

use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    sol_types::{SolCall, SolValue},
};
use serde::{Deserialize, Serialize};

use super::{
    contracts::{ProxyAdmin, XagonZkEVMTimelock},
    parameters::{GasOptions, SignerOptions},
};
use crate::utils::read_structured_file;

/// `upgrade_parameters.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeParameters {
    pub upgrades: Vec<UpgradeTarget>,
    #[serde(default)]
    pub timelock_salt: Option<B256>,
    #[serde(default)]
    pub timelock_min_delay: Option<u64>,
    #[serde(flatten)]
    pub signer: SignerOptions,
    #[serde(flatten)]
    pub gas: GasOptions,
}

impl UpgradeParameters {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let params: Self = read_structured_file(path)?;
        anyhow::ensure!(!params.upgrades.is_empty(), "No upgrades listed in {}", path.display());
        Ok(params)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeTarget {
    /// Proxy being upgraded.
    pub address: Address,
    pub contract_name: String,
    #[serde(default)]
    pub constructor_args: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub call_after_upgrade: Option<CallAfterUpgrade>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAfterUpgrade {
    pub function_name: String,
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

/// One call routed through the timelock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelockOperation {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
    pub predecessor: B256,
    pub salt: B256,
}

impl TimelockOperation {
    /// Proxy admin call that points `proxy` at `implementation`, optionally
    /// calling into it right after.
    pub fn upgrade_proxy(
        proxy_admin: Address,
        proxy: Address,
        implementation: Address,
        call_after: Option<Bytes>,
        salt: B256,
    ) -> Self {
        let data = match call_after {
            Some(data) => ProxyAdmin::upgradeAndCallCall {
                proxy,
                implementation,
                data,
            }
            .abi_encode(),
            None => ProxyAdmin::upgradeCall {
                proxy,
                implementation,
            }
            .abi_encode(),
        };
        Self {
            target: proxy_admin,
            value: U256::ZERO,
            data: data.into(),
            predecessor: B256::ZERO,
            salt,
        }
    }

    /// Same id the timelock computes in `hashOperation`.
    pub fn id(&self) -> B256 {
        keccak256(
            (
                self.target,
                self.value,
                self.data.clone(),
                self.predecessor,
                self.salt,
            )
                .abi_encode_params(),
        )
    }

    pub fn schedule_calldata(&self, delay: u64) -> Bytes {
        XagonZkEVMTimelock::scheduleCall {
            target: self.target,
            value: self.value,
            data: self.data.clone(),
            predecessor: self.predecessor,
            salt: self.salt,
            delay: U256::from(delay),
        }
        .abi_encode()
        .into()
    }

    pub fn execute_calldata(&self) -> Bytes {
        XagonZkEVMTimelock::executeCall {
            target: self.target,
            value: self.value,
            payload: self.data.clone(),
            predecessor: self.predecessor,
            salt: self.salt,
        }
        .abi_encode()
        .into()
    }
}

/// One entry of `upgrade_output_<ts>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOutputEntry {
    pub contract_name: String,
    pub proxy_address: Address,
    pub implementation_address: Address,
    pub operation_id: B256,
    pub schedule_data: Bytes,
    pub execute_data: Bytes,
}

use std::path::Path;

use alloy::primitives::{Address, B256};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    errors::DeployError,
    utils::{
        network::{parse_gwei, GasSettings},
        read_structured_file,
    },
};

/// Keys that must be present and non-empty in the deployment parameters file.
pub const MANDATORY_DEPLOYMENT_PARAMETERS: [&str; 17] = [
    "realVerifier",
    "trustedSequencerURL",
    "networkName",
    "version",
    "trustedSequencer",
    "chainID",
    "admin",
    "trustedAggregator",
    "trustedAggregatorTimeout",
    "pendingStateTimeout",
    "forkID",
    "zkEVMOwner",
    "timelockAddress",
    "minDelayTimelock",
    "salt",
    "zkEVMDeployerAddress",
    "maticTokenAddress",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentParameters {
    pub real_verifier: bool,
    #[serde(rename = "trustedSequencerURL")]
    pub trusted_sequencer_url: String,
    pub network_name: String,
    pub version: String,
    pub trusted_sequencer: Address,
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    pub admin: Address,
    pub trusted_aggregator: Address,
    pub trusted_aggregator_timeout: u64,
    pub pending_state_timeout: u64,
    #[serde(rename = "forkID")]
    pub fork_id: u64,
    #[serde(rename = "zkEVMOwner")]
    pub zkevm_owner: Address,
    pub timelock_address: Address,
    pub min_delay_timelock: u64,
    pub salt: B256,
    #[serde(rename = "zkEVMDeployerAddress")]
    pub zkevm_deployer_address: Address,
    #[serde(rename = "maticTokenAddress")]
    pub fee_token_address: Address,

    #[serde(flatten)]
    pub signer: SignerOptions,
    #[serde(flatten)]
    pub gas: GasOptions,
}

impl DeploymentParameters {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let value: serde_json::Value = read_structured_file(path)?;
        Self::from_value(value).with_context(|| format!("Invalid parameters in {}", path.display()))
    }

    /// Checks every mandatory key up front, then reads the typed record.
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        for name in MANDATORY_DEPLOYMENT_PARAMETERS {
            if is_missing(value.get(name)) {
                return Err(DeployError::MissingParameter(name.to_string()).into());
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn is_missing(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Optional in-file signer. Empty strings count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignerOptions {
    #[serde(default, skip_serializing)]
    pub deployer_pvt_key: Option<String>,
}

impl SignerOptions {
    pub fn private_key(&self) -> Option<&str> {
        self.deployer_pvt_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Optional fee overrides shared by the deployment and upgrade parameter files.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GasOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier_gas: Option<serde_json::Value>,
}

impl GasOptions {
    pub fn settings(&self) -> anyhow::Result<GasSettings> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        if let (Some(max_fee), Some(max_priority)) = (
            non_empty(&self.max_fee_per_gas),
            non_empty(&self.max_priority_fee_per_gas),
        ) {
            log::info!("Hardcoded gas used: MaxPriority {max_priority} gwei, MaxFee {max_fee} gwei");
            return Ok(GasSettings::Fixed {
                max_fee_per_gas: parse_gwei(&max_fee)?,
                max_priority_fee_per_gas: parse_gwei(&max_priority)?,
            });
        }

        let multiplier = match &self.multiplier_gas {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.is_empty() => None,
            Some(serde_json::Value::String(s)) => {
                Some(s.parse::<u64>().with_context(|| format!("Invalid multiplierGas {s}"))?)
            }
            Some(serde_json::Value::Number(n)) => Some(
                n.as_u64()
                    .with_context(|| format!("Invalid multiplierGas {n}"))?,
            ),
            Some(other) => anyhow::bail!("Invalid multiplierGas {other}"),
        };
        Ok(match multiplier {
            Some(multiplier) => {
                log::info!("Multiplier gas used: {multiplier}");
                GasSettings::Multiplier(multiplier)
            }
            None => GasSettings::Estimated,
        })
    }
}

/// Only the settlement root is consumed from the genesis file.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Genesis {
    pub root: B256,
}

impl Genesis {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        read_structured_file(path)
    }
}

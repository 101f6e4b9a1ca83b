use std::path::Path;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::utils::{read_structured_file, write_json_atomically};

/// `deploy_output.json`: where everything went live, plus the parameters used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutput {
    #[serde(rename = "xagonZkEVMAddress")]
    pub rollup_address: Address,
    #[serde(rename = "xagonZkEVMBridgeAddress")]
    pub bridge_address: Address,
    #[serde(rename = "xagonZkEVMGlobalExitRootAddress")]
    pub global_exit_root_address: Address,
    #[serde(rename = "maticTokenAddress")]
    pub fee_token_address: Address,
    pub verifier_address: Address,
    #[serde(rename = "zkEVMDeployerContract")]
    pub zkevm_deployer_contract: Address,
    pub deployer_address: Address,
    pub timelock_contract_address: Address,
    pub proxy_admin_address: Address,
    /// Block of the rollup proxy deployment, `0` when it was resumed from a checkpoint.
    pub deployment_block_number: u64,
    pub genesis_root: B256,
    pub trusted_sequencer: Address,
    #[serde(rename = "trustedSequencerURL")]
    pub trusted_sequencer_url: String,
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    pub network_name: String,
    pub admin: Address,
    pub trusted_aggregator: Address,
    #[serde(rename = "forkID")]
    pub fork_id: u64,
    pub salt: B256,
    pub version: String,
}

impl DeploymentOutput {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        read_structured_file(path)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        write_json_atomically(path, self)
    }
}

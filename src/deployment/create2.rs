use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    sol_types::SolCall,
};
use anyhow::Context;

use crate::{
    elements::contracts::XagonZkEVMDeployer,
    utils::{
        compute_create2_address_evm,
        network::{Chain, TxRequest},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicDeployment {
    pub address: Address,
    /// `false` when code was already present and nothing was sent.
    pub was_deployed: bool,
}

/// Address the deployer contract at `factory` assigns to `init_code` under `salt`.
pub fn deterministic_address(factory: Address, salt: B256, init_code: &[u8]) -> Address {
    compute_create2_address_evm(factory, salt, keccak256(init_code))
}

/// Deploys `init_code` through the deterministic deployer contract, optionally
/// calling the new contract right after (from the deployer contract).
///
/// Idempotent: if the target address already holds code, no transaction is
/// sent.
pub async fn create2_deployment<C: Chain>(
    chain: &C,
    factory: Address,
    salt: B256,
    init_code: &Bytes,
    call_data: Option<Bytes>,
    gas_limit: Option<u64>,
) -> anyhow::Result<DeterministicDeployment> {
    let address = deterministic_address(factory, salt, init_code);
    if !chain.code_at(address).await?.is_empty() {
        return Ok(DeterministicDeployment {
            address,
            was_deployed: false,
        });
    }

    let input = match call_data {
        Some(data_call) => XagonZkEVMDeployer::deployDeterministicAndCallCall {
            amount: U256::ZERO,
            salt,
            initBytecode: init_code.clone(),
            dataCall: data_call,
        }
        .abi_encode(),
        None => XagonZkEVMDeployer::deployDeterministicCall {
            amount: U256::ZERO,
            salt,
            initBytecode: init_code.clone(),
        }
        .abi_encode(),
    };
    chain
        .send(TxRequest::call(factory, input).with_gas_limit(gas_limit))
        .await
        .with_context(|| format!("Deterministic deployment to {address}"))?;

    Ok(DeterministicDeployment {
        address,
        was_deployed: true,
    })
}

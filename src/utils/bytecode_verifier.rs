use alloy::primitives::{keccak256, Bytes, FixedBytes};
use std::collections::HashMap;

use crate::elements::contracts::{ContractKind, ContractRegistry};

use super::network::Chain;

pub struct BytecodeVerifier {
    /// Maps deployed bytecode hash to the corresponding contract name.
    deployed_bytecode_file_by_hash: HashMap<FixedBytes<32>, String>,
}

impl BytecodeVerifier {
    /// Knows the runtime code of every artifact that has no immutables.
    ///
    /// Contracts with immutables only get a known hash once their creation was
    /// simulated with the right constructor arguments, see
    /// [BytecodeVerifier::insert_simulated_deployment].
    pub fn from_registry(registry: &ContractRegistry, kinds: &[ContractKind]) -> Self {
        let mut result = Self {
            deployed_bytecode_file_by_hash: HashMap::new(),
        };
        for kind in kinds {
            let artifact = registry.artifact(*kind);
            result.insert_evm_deployed_bytecode_hash(
                keccak256(&artifact.deployed_bytecode),
                artifact.contract_name.clone(),
            );
        }
        result
    }

    /// Returns the contract name corresponding to the given deployed bytecode hash.
    pub fn evm_deployed_bytecode_hash_to_file(
        &self,
        bytecode_hash: &FixedBytes<32>,
    ) -> Option<&String> {
        self.deployed_bytecode_file_by_hash.get(bytecode_hash)
    }

    /// Inserts an entry for the given deployed bytecode hash and contract name.
    pub fn insert_evm_deployed_bytecode_hash(
        &mut self,
        bytecode_hash: FixedBytes<32>,
        file: String,
    ) {
        self.deployed_bytecode_file_by_hash
            .insert(bytecode_hash, file);
    }

    /// Runs `init_code` on the node without mining it and registers the
    /// resulting runtime code under `file`.
    pub async fn insert_simulated_deployment<C: Chain>(
        &mut self,
        chain: &C,
        init_code: Bytes,
        file: &str,
    ) -> anyhow::Result<FixedBytes<32>> {
        let runtime = chain.simulate_create(init_code).await?;
        anyhow::ensure!(!runtime.is_empty(), "Simulated creation of {file} returned no code");
        let hash = keccak256(&runtime);
        self.insert_evm_deployed_bytecode_hash(hash, file.to_string());
        Ok(hash)
    }
}

use alloy::primitives::{map::HashMap, Address};

use crate::elements::output::DeploymentOutput;

/// Names for every address a deployment output knows about.
pub struct AddressVerifier {
    pub address_to_name: HashMap<Address, String>,
    pub name_to_address: HashMap<String, Address>,
}

impl AddressVerifier {
    pub fn new(output: &DeploymentOutput) -> Self {
        let mut result = Self {
            address_to_name: Default::default(),
            name_to_address: Default::default(),
        };

        result.add_address(Address::ZERO, "zero");
        result.add_address(output.verifier_address, "verifier");
        result.add_address(output.zkevm_deployer_contract, "zkevm_deployer");
        result.add_address(output.deployer_address, "deployer");
        result.add_address(output.proxy_admin_address, "proxy_admin");
        result.add_address(output.bridge_address, "bridge_proxy");
        result.add_address(output.global_exit_root_address, "global_exit_root_proxy");
        result.add_address(output.rollup_address, "rollup_proxy");
        result.add_address(output.timelock_contract_address, "timelock");
        result.add_address(output.fee_token_address, "fee_token");
        result.add_address(output.trusted_sequencer, "trusted_sequencer");
        result.add_address(output.trusted_aggregator, "trusted_aggregator");

        result
    }

    pub fn reverse_lookup(&self, address: &Address) -> Option<&String> {
        self.address_to_name.get(address)
    }

    pub fn name_or_unknown(&self, address: &Address) -> String {
        match self.address_to_name.get(address) {
            Some(name) => name.clone(),
            None => format!("Unknown {}", address),
        }
    }

    /// Later names win for addresses that play several roles.
    pub fn add_address(&mut self, address: Address, name: &str) {
        self.name_to_address.insert(name.to_string(), address);
        self.address_to_name.insert(address, name.to_string());
    }
}

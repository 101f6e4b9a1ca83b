use std::fmt;

use alloy::{
    primitives::{keccak256, Address, U256},
    sol_types::SolConstructor,
};
use colored::Colorize;

use crate::{
    elements::{
        contracts::{
            ContractKind, ContractRegistry, ProxyAdmin, XagonZkEVM, XagonZkEVMGlobalExitRoot,
            XagonZkEVMTimelock,
        },
        output::DeploymentOutput,
        parameters::DeploymentParameters,
    },
    utils::{
        address_from_word, address_verifier::AddressVerifier, bytecode_verifier::BytecodeVerifier,
        eip1967_admin_slot, eip1967_implementation_slot, network::Chain,
    },
};

#[derive(Default)]
pub struct VerificationResult {
    pub result: String,
    pub warnings: u64,
    pub errors: u64,
}

impl VerificationResult {
    pub fn print_info(&self, info: &str) {
        println!("{}", info);
    }

    pub fn report_ok(&self, info: &str) {
        println!("{} {}", "[OK]: ".green(), info);
    }

    pub fn report_warn(&mut self, warn: &str) {
        self.warnings += 1;
        println!("{} {}", "[WARN]:".yellow(), warn);
    }

    pub fn report_error(&mut self, error: &str) {
        self.errors += 1;
        println!("{} {}", "[ERROR]:".red(), error);
    }

    /// Checks that `address` carries the label `expected` in the address book.
    pub fn expect_address(
        &mut self,
        verifiers: &Verifiers,
        address: &Address,
        expected: &str,
    ) -> bool {
        match verifiers.address_verifier.reverse_lookup(address) {
            Some(name) if name == expected => {
                self.report_ok(&format!("{} at {}", expected, address));
                true
            }
            other => {
                self.report_error(&format!(
                    "Expected address {} to be {}, got {}",
                    address,
                    expected,
                    other.map(String::as_str).unwrap_or("unknown")
                ));
                false
            }
        }
    }

    /// Checks that the runtime code at `address` is the one of contract `expected`.
    pub async fn expect_deployed_bytecode<C: Chain>(
        &mut self,
        verifiers: &Verifiers,
        chain: &C,
        address: &Address,
        expected: &str,
    ) -> anyhow::Result<bool> {
        let label = verifiers.address_verifier.name_or_unknown(address);
        let code = chain.code_at(*address).await?;
        if code.is_empty() {
            self.report_error(&format!("{label} ({address}) has no code, expected {expected}"));
            return Ok(false);
        }
        match verifiers
            .bytecode_verifier
            .evm_deployed_bytecode_hash_to_file(&keccak256(&code))
        {
            Some(file) if file == expected => {
                self.report_ok(&format!("{label} ({address}) runs {expected}"));
                Ok(true)
            }
            Some(file) => {
                self.report_error(&format!(
                    "{label} ({address}) runs {file}, expected {expected}"
                ));
                Ok(false)
            }
            None => {
                self.report_error(&format!(
                    "{label} ({address}) runs unknown bytecode, expected {expected}"
                ));
                Ok(false)
            }
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors > 0 {
            let res = "ERROR".red();
            write!(
                f,
                "{} errors: {}, warnings: {} - result: {}",
                res, self.errors, self.warnings, self.result
            )
        } else if self.warnings == 0 {
            let res = "OK".green();
            write!(f, "{} - result: {}", res, self.result)
        } else {
            let res = "WARN".yellow();
            write!(
                f,
                "{} warnings: {} - result: {}",
                res, self.warnings, self.result
            )
        }
    }
}

pub struct Verifiers {
    pub address_verifier: AddressVerifier,
    pub bytecode_verifier: BytecodeVerifier,
}

impl Verifiers {
    /// Address book from the deployment output, bytecode book from the
    /// artifacts plus simulated creations of the contracts with immutables.
    pub async fn new<C: Chain>(
        chain: &C,
        registry: &ContractRegistry,
        output: &DeploymentOutput,
        params: &DeploymentParameters,
    ) -> anyhow::Result<Self> {
        let mut address_verifier = AddressVerifier::new(output);
        let mut bytecode_verifier = BytecodeVerifier::from_registry(
            registry,
            &[
                ContractKind::verifier(params.real_verifier),
                ContractKind::Deployer,
                ContractKind::ProxyAdmin,
                ContractKind::TransparentProxy,
                ContractKind::Bridge,
            ],
        );

        let timelock_args = XagonZkEVMTimelock::constructorCall {
            minDelay: U256::from(params.min_delay_timelock),
            proposers: vec![params.timelock_address],
            executors: vec![params.timelock_address],
            admin: params.timelock_address,
            _xagonZkEVM: output.rollup_address,
        }
        .abi_encode();
        let global_exit_root_args = XagonZkEVMGlobalExitRoot::constructorCall {
            _rollupAddress: output.rollup_address,
            _bridgeAddress: output.bridge_address,
        }
        .abi_encode();
        let rollup_args = XagonZkEVM::constructorCall {
            _globalExitRootManager: output.global_exit_root_address,
            _matic: output.fee_token_address,
            _rollupVerifier: output.verifier_address,
            _bridgeAddress: output.bridge_address,
            _chainID: output.chain_id,
            _forkID: output.fork_id,
        }
        .abi_encode();

        for (kind, args) in [
            (ContractKind::Timelock, timelock_args),
            (ContractKind::GlobalExitRoot, global_exit_root_args),
            (ContractKind::Rollup, rollup_args),
        ] {
            bytecode_verifier
                .insert_simulated_deployment(
                    chain,
                    registry.creation_code(kind, &args),
                    kind.artifact_name(),
                )
                .await?;
        }

        for (proxy, name) in [
            (output.bridge_address, "bridge_implementation"),
            (output.global_exit_root_address, "global_exit_root_implementation"),
            (output.rollup_address, "rollup_implementation"),
        ] {
            let implementation =
                address_from_word(chain.storage_at(proxy, eip1967_implementation_slot()).await?);
            address_verifier.add_address(implementation, name);
        }

        Ok(Self {
            address_verifier,
            bytecode_verifier,
        })
    }
}

/// Compares what runs on chain with what the artifacts and the deployment
/// output say should run there. Findings go to `result`; only transport
/// failures are returned as errors.
pub async fn verify_deployment<C: Chain>(
    chain: &C,
    registry: &ContractRegistry,
    output: &DeploymentOutput,
    params: &DeploymentParameters,
    result: &mut VerificationResult,
) -> anyhow::Result<()> {
    let verifiers = Verifiers::new(chain, registry, output, params).await?;
    let book = &verifiers.address_verifier;

    result.print_info("== Contracts without immutables ==");
    let verifier_kind = ContractKind::verifier(params.real_verifier);
    for (address, kind) in [
        (output.verifier_address, verifier_kind),
        (output.zkevm_deployer_contract, ContractKind::Deployer),
        (book.name_to_address["bridge_implementation"], ContractKind::Bridge),
        (output.proxy_admin_address, ContractKind::ProxyAdmin),
    ] {
        result
            .expect_deployed_bytecode(&verifiers, chain, &address, kind.artifact_name())
            .await?;
    }

    result.print_info("== Contracts with immutables ==");
    for (address, kind) in [
        (output.timelock_contract_address, ContractKind::Timelock),
        (
            book.name_to_address["global_exit_root_implementation"],
            ContractKind::GlobalExitRoot,
        ),
        (book.name_to_address["rollup_implementation"], ContractKind::Rollup),
    ] {
        result
            .expect_deployed_bytecode(&verifiers, chain, &address, kind.artifact_name())
            .await?;
    }

    result.print_info("== Proxies ==");
    for proxy in [
        output.bridge_address,
        output.global_exit_root_address,
        output.rollup_address,
    ] {
        result
            .expect_deployed_bytecode(
                &verifiers,
                chain,
                &proxy,
                ContractKind::TransparentProxy.artifact_name(),
            )
            .await?;
        let admin = address_from_word(chain.storage_at(proxy, eip1967_admin_slot()).await?);
        result.expect_address(&verifiers, &admin, "proxy_admin");
    }

    let admin_owner = registry
        .bind(ContractKind::ProxyAdmin, output.proxy_admin_address, chain)
        .read(ProxyAdmin::ownerCall {})
        .await?
        ._0;
    if admin_owner == output.timelock_contract_address {
        result.report_ok(&format!("proxy_admin owned by timelock {admin_owner}"));
    } else {
        result.report_warn(&format!(
            "proxy_admin owned by {}, not by the timelock",
            book.name_or_unknown(&admin_owner)
        ));
    }

    let genesis_root = registry
        .bind(ContractKind::Rollup, output.rollup_address, chain)
        .read(XagonZkEVM::batchNumToStateRootCall { batchNum: 0 })
        .await?
        ._0;
    if genesis_root == output.genesis_root {
        result.report_ok(&format!("Genesis root {genesis_root}"));
    } else {
        result.report_error(&format!(
            "Genesis root on chain is {genesis_root}, expected {}",
            output.genesis_root
        ));
    }

    result.result = format!("{} (chainID {})", output.network_name, output.chain_id);
    Ok(())
}

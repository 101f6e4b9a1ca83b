//! Ordered, resumable deployment of the rollup contract system.

use std::path::{Path, PathBuf};

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::{SolCall, SolConstructor},
};
use anyhow::Context;

use crate::{
    elements::{
        checkpoint::{
            CheckpointStore, BRIDGE_IMPLEMENTATION, BRIDGE_PROXY, GLOBAL_EXIT_ROOT, PROXY_ADMIN,
            ROLLUP_CONTRACT, VERIFIER_CONTRACT,
        },
        contracts::{
            ContractKind, ContractRegistry, InitializePackedParameters, ProxyAdmin,
            TransparentUpgradeableProxy, XagonZkEVM, XagonZkEVMBridge, XagonZkEVMDeployer,
            XagonZkEVMGlobalExitRoot, XagonZkEVMTimelock,
        },
        manifest::ManifestFile,
        output::DeploymentOutput,
        parameters::{DeploymentParameters, Genesis},
    },
    errors::{ensure_address, ensure_value, DeployError},
    utils::{
        address_from_word, eip1967_admin_slot, eip1967_implementation_slot,
        network::{Chain, TxRequest},
        retry::retry_capped,
    },
};

pub mod create2;
pub mod events;
pub mod precompute;
pub mod proxy;

use create2::{create2_deployment, deterministic_address, DeterministicDeployment};
use events::{DeploymentEvent, EventSink};
use precompute::precompute_address;
use proxy::{ProxyDeployment, TransparentProxyDeployment};

/// Network id the bridge is initialized with on L1.
pub const NETWORK_ID_MAINNET: u32 = 0;
pub const DEFAULT_PROXY_ATTEMPTS: u32 = 20;
/// Gas estimation of the bridge implementation going through the deployer
/// contract comes out too low.
pub const BRIDGE_IMPLEMENTATION_GAS_LIMIT: u64 = 5_500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Ceiling for each upgradable proxy deployment.
    pub proxy_attempts: u32,
    pub bridge_implementation_gas_limit: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            proxy_attempts: DEFAULT_PROXY_ATTEMPTS,
            bridge_implementation_gas_limit: BRIDGE_IMPLEMENTATION_GAS_LIMIT,
        }
    }
}

/// Files a deployment run reads and writes.
#[derive(Debug, Clone)]
pub struct DeploymentPaths {
    pub checkpoint: PathBuf,
    pub output: PathBuf,
    pub manifest: PathBuf,
}

/// Global exit root and rollup addresses, needed before either exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DependentPair {
    global_exit_root: Address,
    rollup: Address,
}

pub struct Sequencer<'a, C, S> {
    chain: &'a C,
    registry: &'a ContractRegistry,
    params: &'a DeploymentParameters,
    genesis_root: B256,
    paths: DeploymentPaths,
    config: SequencerConfig,
    events: S,
}

impl<'a, C: Chain, S: EventSink> Sequencer<'a, C, S> {
    pub fn new(
        chain: &'a C,
        registry: &'a ContractRegistry,
        params: &'a DeploymentParameters,
        genesis_root: B256,
        paths: DeploymentPaths,
        config: SequencerConfig,
        events: S,
    ) -> Self {
        Self {
            chain,
            registry,
            params,
            genesis_root,
            paths,
            config,
            events,
        }
    }

    /// Runs every step, resuming from the checkpoint when there is one.
    ///
    /// On success the output file is written and the checkpoint removed. On
    /// failure the checkpoint keeps every step completed so far.
    pub async fn run(mut self) -> anyhow::Result<DeploymentOutput> {
        // Nothing may touch the network before this check.
        let mut manifest = ManifestFile::create_fresh(&self.paths.manifest)?;
        let mut checkpoint = CheckpointStore::load(&self.paths.checkpoint)?;
        if !checkpoint.is_empty() {
            self.events.emit(DeploymentEvent::Resuming {
                path: checkpoint.path().to_path_buf(),
                entries: checkpoint.entries().len(),
            });
        }

        let deployer = self.chain.sender();
        let params = self.params;
        self.check_deployer_contract(deployer).await?;

        self.events.emit(DeploymentEvent::Stage("Deployment Xagon ZK-EVM"));
        let verifier = self.deploy_verifier(&mut checkpoint).await?;

        let transfer_to_deployer = ProxyAdmin::transferOwnershipCall { newOwner: deployer }.abi_encode();
        let proxy_admin = self
            .deterministic_step(
                &mut checkpoint,
                PROXY_ADMIN,
                self.registry.creation_code(ContractKind::ProxyAdmin, &[]),
                Some(transfer_to_deployer.into()),
                None,
            )
            .await?
            .address;

        let bridge_implementation = self
            .deterministic_step(
                &mut checkpoint,
                BRIDGE_IMPLEMENTATION,
                self.registry.creation_code(ContractKind::Bridge, &[]),
                None,
                Some(self.config.bridge_implementation_gas_limit),
            )
            .await?
            .address;

        let bridge_proxy_code = self.registry.creation_code(
            ContractKind::TransparentProxy,
            &TransparentUpgradeableProxy::constructorCall {
                _logic: bridge_implementation,
                admin_: proxy_admin,
                _data: Bytes::new(),
            }
            .abi_encode(),
        );
        let pair = self
            .plan_dependent_pair(&mut checkpoint, deployer, &bridge_proxy_code)
            .await?;
        let bridge = self
            .deploy_bridge_proxy(&mut checkpoint, bridge_proxy_code, pair)
            .await?;
        manifest.import_proxy(
            bridge,
            bridge_implementation,
            proxy_admin,
            ContractKind::Bridge.artifact_name(),
        )?;

        let global_exit_root = self
            .deploy_global_exit_root(&mut checkpoint, &mut manifest, pair, bridge, proxy_admin)
            .await?;

        let (rollup, deployment_block_number) = self
            .deploy_rollup(
                &mut checkpoint,
                &mut manifest,
                pair,
                verifier,
                bridge,
                proxy_admin,
            )
            .await?;

        for (contract, proxy) in [
            (BRIDGE_PROXY, bridge),
            (GLOBAL_EXIT_ROOT, global_exit_root),
            (ROLLUP_CONTRACT, rollup),
        ] {
            let admin = address_from_word(self.chain.storage_at(proxy, eip1967_admin_slot()).await?);
            ensure_address(&format!("{contract} proxy admin"), proxy_admin, admin)?;
        }

        let timelock = self.deploy_timelock(proxy_admin, rollup, deployer).await?;

        let output = DeploymentOutput {
            rollup_address: rollup,
            bridge_address: bridge,
            global_exit_root_address: global_exit_root,
            fee_token_address: params.fee_token_address,
            verifier_address: verifier,
            zkevm_deployer_contract: params.zkevm_deployer_address,
            deployer_address: deployer,
            timelock_contract_address: timelock,
            proxy_admin_address: proxy_admin,
            deployment_block_number,
            genesis_root: self.genesis_root,
            trusted_sequencer: params.trusted_sequencer,
            trusted_sequencer_url: params.trusted_sequencer_url.clone(),
            chain_id: params.chain_id,
            network_name: params.network_name.clone(),
            admin: params.admin,
            trusted_aggregator: params.trusted_aggregator,
            fork_id: params.fork_id,
            salt: params.salt,
            version: params.version.clone(),
        };
        output.write(&self.paths.output)?;
        checkpoint.finalize()?;
        self.events
            .emit(DeploymentEvent::OutputWritten(self.paths.output.clone()));

        Ok(output)
    }

    async fn check_deployer_contract(&mut self, deployer: Address) -> anyhow::Result<()> {
        let factory = self.params.zkevm_deployer_address;
        if self.chain.code_at(factory).await?.is_empty() {
            return Err(DeployError::DeployerContractMissing(factory).into());
        }
        let owner = self
            .registry
            .bind(ContractKind::Deployer, factory, self.chain)
            .read(XagonZkEVMDeployer::ownerCall {})
            .await?
            ._0;
        ensure_address("zkEVMDeployer owner", deployer, owner)?;
        Ok(())
    }

    async fn deploy_verifier(&mut self, checkpoint: &mut CheckpointStore) -> anyhow::Result<Address> {
        if let Some(address) = checkpoint.get(VERIFIER_CONTRACT) {
            anyhow::ensure!(
                !self.chain.code_at(address).await?.is_empty(),
                "{VERIFIER_CONTRACT} recorded at {address} has no code"
            );
            self.events.emit(DeploymentEvent::Reused {
                contract: VERIFIER_CONTRACT,
                address,
            });
            return Ok(address);
        }

        let kind = ContractKind::verifier(self.params.real_verifier);
        let address = self
            .chain
            .send(TxRequest::create(self.registry.creation_code(kind, &[])))
            .await
            .with_context(|| format!("{kind} deployment"))?
            .contract_address
            .with_context(|| format!("{kind} receipt has no contract address"))?;
        checkpoint.record_step(VERIFIER_CONTRACT, address)?;
        self.events.emit(DeploymentEvent::Deployed {
            contract: VERIFIER_CONTRACT,
            address,
            fresh: true,
        });
        Ok(address)
    }

    /// One deployment through the deterministic deployer contract.
    ///
    /// A checkpointed entry must match the address the inputs lead to and
    /// still hold code.
    async fn deterministic_step(
        &mut self,
        checkpoint: &mut CheckpointStore,
        contract: &'static str,
        init_code: Bytes,
        call_data: Option<Bytes>,
        gas_limit: Option<u64>,
    ) -> anyhow::Result<DeterministicDeployment> {
        let factory = self.params.zkevm_deployer_address;
        let salt = self.params.salt;

        if let Some(recorded) = checkpoint.get(contract) {
            let expected = deterministic_address(factory, salt, &init_code);
            ensure_address(&format!("{contract} checkpoint"), expected, recorded)?;
            anyhow::ensure!(
                !self.chain.code_at(recorded).await?.is_empty(),
                "{contract} recorded at {recorded} has no code"
            );
            self.events.emit(DeploymentEvent::Reused {
                contract,
                address: recorded,
            });
            return Ok(DeterministicDeployment {
                address: recorded,
                was_deployed: false,
            });
        }

        let deployment =
            create2_deployment(self.chain, factory, salt, &init_code, call_data, gas_limit).await?;
        checkpoint.record_step(contract, deployment.address)?;
        self.events.emit(DeploymentEvent::Deployed {
            contract,
            address: deployment.address,
            fresh: deployment.was_deployed,
        });
        Ok(deployment)
    }

    /// Global exit root and rollup addresses, either both from the checkpoint
    /// or both predicted from the deployer nonce.
    ///
    /// The prediction assumes the transaction order of the following steps:
    /// bridge proxy (only when not on chain yet), then implementation and
    /// proxy of the global exit root, then of the rollup.
    async fn plan_dependent_pair(
        &mut self,
        checkpoint: &mut CheckpointStore,
        deployer: Address,
        bridge_proxy_code: &[u8],
    ) -> anyhow::Result<DependentPair> {
        if let (Some(global_exit_root), Some(rollup)) =
            (checkpoint.get(GLOBAL_EXIT_ROOT), checkpoint.get(ROLLUP_CONTRACT))
        {
            return Ok(DependentPair {
                global_exit_root,
                rollup,
            });
        }
        // A half recorded pair is not trusted.
        if checkpoint.get(GLOBAL_EXIT_ROOT).is_some() || checkpoint.get(ROLLUP_CONTRACT).is_some() {
            checkpoint.clear_entries(&[GLOBAL_EXIT_ROOT, ROLLUP_CONTRACT])?;
        }

        let bridge_proxy = deterministic_address(
            self.params.zkevm_deployer_address,
            self.params.salt,
            bridge_proxy_code,
        );
        let bridge_pending = self.chain.code_at(bridge_proxy).await?.is_empty() as u64;

        let global_exit_root = precompute_address(self.chain, deployer, bridge_pending + 1).await?;
        let rollup = precompute_address(self.chain, deployer, bridge_pending + 3).await?;
        for (contract, precomputed) in [(GLOBAL_EXIT_ROOT, global_exit_root), (ROLLUP_CONTRACT, rollup)] {
            self.events.emit(DeploymentEvent::Precomputed {
                contract,
                address: precomputed.address,
                nonce: precomputed.nonce,
            });
        }

        Ok(DependentPair {
            global_exit_root: global_exit_root.address,
            rollup: rollup.address,
        })
    }

    async fn deploy_bridge_proxy(
        &mut self,
        checkpoint: &mut CheckpointStore,
        bridge_proxy_code: Bytes,
        pair: DependentPair,
    ) -> anyhow::Result<Address> {
        let initialize = XagonZkEVMBridge::initializeCall {
            _networkID: NETWORK_ID_MAINNET,
            _globalExitRootManager: pair.global_exit_root,
            _xagonZkEVMaddress: pair.rollup,
        }
        .abi_encode();
        let deployment = self
            .deterministic_step(
                checkpoint,
                BRIDGE_PROXY,
                bridge_proxy_code,
                Some(initialize.into()),
                None,
            )
            .await?;

        let bridge = self
            .registry
            .bind(ContractKind::Bridge, deployment.address, self.chain);
        let manager = bridge.read(XagonZkEVMBridge::globalExitRootManagerCall {}).await?._0;
        let rollup = bridge.read(XagonZkEVMBridge::xagonZkEVMaddressCall {}).await?._0;
        if !deployment.was_deployed {
            ensure_address("bridge globalExitRootManager", pair.global_exit_root, manager)?;
            ensure_address("bridge xagonZkEVMaddress", pair.rollup, rollup)?;
        }
        let network_id = bridge.read(XagonZkEVMBridge::networkIDCall {}).await?._0;
        self.observe("bridge networkID", network_id);
        self.observe("bridge globalExitRootManager", manager);
        self.observe("bridge xagonZkEVMaddress", rollup);

        Ok(deployment.address)
    }

    async fn deploy_global_exit_root(
        &mut self,
        checkpoint: &mut CheckpointStore,
        manifest: &mut ManifestFile,
        pair: DependentPair,
        bridge: Address,
        proxy_admin: Address,
    ) -> anyhow::Result<Address> {
        let name = ContractKind::GlobalExitRoot.artifact_name();

        if let Some(recorded) = checkpoint.get(GLOBAL_EXIT_ROOT) {
            let contract = self
                .registry
                .bind(ContractKind::GlobalExitRoot, recorded, self.chain);
            let bridge_address = contract
                .read(XagonZkEVMGlobalExitRoot::bridgeAddressCall {})
                .await?
                ._0;
            let rollup_address = contract
                .read(XagonZkEVMGlobalExitRoot::rollupAddressCall {})
                .await?
                ._0;
            ensure_address("globalExitRoot bridgeAddress", bridge, bridge_address)?;
            ensure_address("globalExitRoot rollupAddress", pair.rollup, rollup_address)?;

            let implementation = self.implementation_of(recorded).await?;
            manifest.import_proxy(recorded, implementation, proxy_admin, name)?;
            self.events.emit(DeploymentEvent::Reused {
                contract: GLOBAL_EXIT_ROOT,
                address: recorded,
            });
            return Ok(recorded);
        }

        let constructor_args = XagonZkEVMGlobalExitRoot::constructorCall {
            _rollupAddress: pair.rollup,
            _bridgeAddress: bridge,
        }
        .abi_encode();
        let deployment = self
            .deploy_proxy_with_retries(
                GLOBAL_EXIT_ROOT,
                ContractKind::GlobalExitRoot,
                constructor_args,
                proxy_admin,
                Bytes::new(),
            )
            .await?;
        ensure_address(
            "xagonZkEVMGlobalExitRoot precalculated address",
            pair.global_exit_root,
            deployment.proxy,
        )?;
        checkpoint.record_step(GLOBAL_EXIT_ROOT, deployment.proxy)?;
        manifest.import_proxy(deployment.proxy, deployment.implementation, proxy_admin, name)?;
        self.events.emit(DeploymentEvent::Deployed {
            contract: GLOBAL_EXIT_ROOT,
            address: deployment.proxy,
            fresh: true,
        });
        Ok(deployment.proxy)
    }

    /// Returns the rollup proxy and the block it was deployed in (`0` when it
    /// comes from the checkpoint). Ownership is handed over to `zkEVMOwner`
    /// if the deployer still holds it.
    async fn deploy_rollup(
        &mut self,
        checkpoint: &mut CheckpointStore,
        manifest: &mut ManifestFile,
        pair: DependentPair,
        verifier: Address,
        bridge: Address,
        proxy_admin: Address,
    ) -> anyhow::Result<(Address, u64)> {
        let params = self.params;
        let name = ContractKind::Rollup.artifact_name();

        let (rollup, deployment_block_number) = match checkpoint.get(ROLLUP_CONTRACT) {
            Some(recorded) => {
                let implementation = self.implementation_of(recorded).await?;
                manifest.import_proxy(recorded, implementation, proxy_admin, name)?;
                self.events.emit(DeploymentEvent::Reused {
                    contract: ROLLUP_CONTRACT,
                    address: recorded,
                });
                (recorded, 0)
            }
            None => {
                let constructor_args = XagonZkEVM::constructorCall {
                    _globalExitRootManager: pair.global_exit_root,
                    _matic: params.fee_token_address,
                    _rollupVerifier: verifier,
                    _bridgeAddress: bridge,
                    _chainID: params.chain_id,
                    _forkID: params.fork_id,
                }
                .abi_encode();
                let initialize = XagonZkEVM::initializeCall {
                    initializePackedParameters: InitializePackedParameters {
                        admin: params.admin,
                        trustedSequencer: params.trusted_sequencer,
                        pendingStateTimeout: params.pending_state_timeout,
                        trustedAggregator: params.trusted_aggregator,
                        trustedAggregatorTimeout: params.trusted_aggregator_timeout,
                    },
                    genesisRoot: self.genesis_root,
                    _trustedSequencerURL: params.trusted_sequencer_url.clone(),
                    _networkName: params.network_name.clone(),
                    _version: params.version.clone(),
                }
                .abi_encode();

                let ProxyDeployment {
                    proxy,
                    implementation,
                    block_number,
                } = self
                    .deploy_proxy_with_retries(
                        ROLLUP_CONTRACT,
                        ContractKind::Rollup,
                        constructor_args,
                        proxy_admin,
                        initialize.into(),
                    )
                    .await?;
                ensure_address("xagonZkEVMContract precalculated address", pair.rollup, proxy)?;
                checkpoint.record_step(ROLLUP_CONTRACT, proxy)?;
                manifest.import_proxy(proxy, implementation, proxy_admin, name)?;
                self.events.emit(DeploymentEvent::Deployed {
                    contract: ROLLUP_CONTRACT,
                    address: proxy,
                    fresh: true,
                });
                (proxy, block_number)
            }
        };

        self.check_rollup_wiring(rollup, pair.global_exit_root, verifier, bridge)
            .await?;

        let contract = self.registry.bind(ContractKind::Rollup, rollup, self.chain);
        let owner = contract.read(XagonZkEVM::ownerCall {}).await?._0;
        let deployer = self.chain.sender();
        if owner == deployer && params.zkevm_owner != deployer {
            contract
                .transact(XagonZkEVM::transferOwnershipCall {
                    newOwner: params.zkevm_owner,
                })
                .await?;
            self.events.emit(DeploymentEvent::OwnershipTransferred {
                contract: ROLLUP_CONTRACT,
                new_owner: params.zkevm_owner,
            });
        } else {
            ensure_address("xagonZkEVM owner", params.zkevm_owner, owner)?;
        }

        Ok((rollup, deployment_block_number))
    }

    async fn check_rollup_wiring(
        &mut self,
        rollup: Address,
        global_exit_root: Address,
        verifier: Address,
        bridge: Address,
    ) -> anyhow::Result<()> {
        let params = self.params;
        let contract = self.registry.bind(ContractKind::Rollup, rollup, self.chain);

        ensure_address(
            "xagonZkEVM globalExitRootManager",
            global_exit_root,
            contract.read(XagonZkEVM::globalExitRootManagerCall {}).await?._0,
        )?;
        ensure_address(
            "xagonZkEVM matic",
            params.fee_token_address,
            contract.read(XagonZkEVM::maticCall {}).await?._0,
        )?;
        ensure_address(
            "xagonZkEVM rollupVerifier",
            verifier,
            contract.read(XagonZkEVM::rollupVerifierCall {}).await?._0,
        )?;
        ensure_address(
            "xagonZkEVM bridgeAddress",
            bridge,
            contract.read(XagonZkEVM::bridgeAddressCall {}).await?._0,
        )?;
        ensure_value(
            "xagonZkEVM chainID",
            params.chain_id,
            contract.read(XagonZkEVM::chainIDCall {}).await?._0,
        )?;
        ensure_value(
            "xagonZkEVM forkID",
            params.fork_id,
            contract.read(XagonZkEVM::forkIDCall {}).await?._0,
        )?;

        let admin = contract.read(XagonZkEVM::adminCall {}).await?._0;
        let trusted_sequencer = contract.read(XagonZkEVM::trustedSequencerCall {}).await?._0;
        let pending_state_timeout = contract.read(XagonZkEVM::pendingStateTimeoutCall {}).await?._0;
        let trusted_aggregator = contract.read(XagonZkEVM::trustedAggregatorCall {}).await?._0;
        let trusted_aggregator_timeout = contract
            .read(XagonZkEVM::trustedAggregatorTimeoutCall {})
            .await?
            ._0;
        let genesis_root = contract
            .read(XagonZkEVM::batchNumToStateRootCall { batchNum: 0 })
            .await?
            ._0;
        let url = contract.read(XagonZkEVM::trustedSequencerURLCall {}).await?._0;
        let network_name = contract.read(XagonZkEVM::networkNameCall {}).await?._0;

        self.observe("admin", admin);
        self.observe("trustedSequencer", trusted_sequencer);
        self.observe("pendingStateTimeout", pending_state_timeout);
        self.observe("trustedAggregator", trusted_aggregator);
        self.observe("trustedAggregatorTimeout", trusted_aggregator_timeout);
        self.observe("genesisRoot", genesis_root);
        self.observe("trustedSequencerURL", url);
        self.observe("networkName", network_name);
        Ok(())
    }

    /// Deploys a new timelock owning the proxy admin, or validates the one
    /// that already does.
    async fn deploy_timelock(
        &mut self,
        proxy_admin: Address,
        rollup: Address,
        deployer: Address,
    ) -> anyhow::Result<Address> {
        let params = self.params;
        self.events.emit(DeploymentEvent::Stage("Deployment timelock"));

        let admin_contract = self
            .registry
            .bind(ContractKind::ProxyAdmin, proxy_admin, self.chain);
        let owner = admin_contract.read(ProxyAdmin::ownerCall {}).await?._0;

        let timelock = if owner != deployer {
            let existing = self.registry.bind(ContractKind::Timelock, owner, self.chain);
            let bound_rollup = existing.read(XagonZkEVMTimelock::xagonZkEVMCall {}).await?._0;
            ensure_address("timelock xagonZkEVM", rollup, bound_rollup)?;
            self.events.emit(DeploymentEvent::Deployed {
                contract: "timelockContract",
                address: owner,
                fresh: false,
            });
            owner
        } else {
            let constructor_args = XagonZkEVMTimelock::constructorCall {
                minDelay: U256::from(params.min_delay_timelock),
                proposers: vec![params.timelock_address],
                executors: vec![params.timelock_address],
                admin: params.timelock_address,
                _xagonZkEVM: rollup,
            }
            .abi_encode();
            let address = self
                .chain
                .send(TxRequest::create(
                    self.registry
                        .creation_code(ContractKind::Timelock, &constructor_args),
                ))
                .await
                .context("Timelock deployment")?
                .contract_address
                .context("Timelock receipt has no contract address")?;
            self.events.emit(DeploymentEvent::Deployed {
                contract: "timelockContract",
                address,
                fresh: true,
            });

            admin_contract
                .transact(ProxyAdmin::transferOwnershipCall { newOwner: address })
                .await?;
            self.events.emit(DeploymentEvent::OwnershipTransferred {
                contract: PROXY_ADMIN,
                new_owner: address,
            });
            address
        };

        let timelock_contract = self.registry.bind(ContractKind::Timelock, timelock, self.chain);
        let min_delay = timelock_contract
            .read(XagonZkEVMTimelock::getMinDelayCall {})
            .await?
            ._0;
        self.observe("timelock minDelay", min_delay);
        Ok(timelock)
    }

    async fn deploy_proxy_with_retries(
        &mut self,
        contract: &'static str,
        kind: ContractKind,
        constructor_args: Vec<u8>,
        proxy_admin: Address,
        init_data: Bytes,
    ) -> Result<ProxyDeployment, DeployError> {
        let deployment = TransparentProxyDeployment::new(
            self.chain,
            self.registry,
            kind,
            constructor_args,
            proxy_admin,
            init_data,
        );
        let events = &mut self.events;

        retry_capped(
            contract,
            self.config.proxy_attempts,
            |_| deployment.attempt(),
            |attempt, err| {
                events.emit(DeploymentEvent::AttemptFailed {
                    contract,
                    attempt,
                    error: format!("{err:#}"),
                });
            },
        )
        .await
    }

    async fn implementation_of(&self, proxy: Address) -> anyhow::Result<Address> {
        let word = self
            .chain
            .storage_at(proxy, eip1967_implementation_slot())
            .await?;
        Ok(address_from_word(word))
    }

    fn observe(&mut self, what: &str, value: impl ToString) {
        self.events.emit(DeploymentEvent::Observed {
            what: what.to_string(),
            value: value.to_string(),
        });
    }
}

/// Runs a deployment from its input files.
///
/// The parameters and genesis files are read and validated first; `connect`
/// only runs once both are known to be complete, so a broken input never
/// reaches the network.
pub async fn deploy_from_files<C, F, S>(
    connect: F,
    registry: &ContractRegistry,
    parameters: &Path,
    genesis: &Path,
    paths: DeploymentPaths,
    config: SequencerConfig,
    events: S,
) -> anyhow::Result<DeploymentOutput>
where
    C: Chain,
    F: FnOnce(&DeploymentParameters) -> anyhow::Result<C>,
    S: EventSink,
{
    let params = DeploymentParameters::load(parameters)?;
    let genesis = Genesis::load(genesis)?;
    let chain = connect(&params)?;

    Sequencer::new(&chain, registry, &params, genesis.root, paths, config, events)
        .run()
        .await
}

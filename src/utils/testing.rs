//! In-memory chain used by the unit tests.
//!
//! Contracts are recognised by the two byte creation code prefix handed out by
//! [test_registry]. Their constructors and the handful of mutating functions
//! the deployment relies on are emulated by writing the values their getters
//! would return afterwards.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    sol_types::{SolCall, SolValue},
};
use anyhow::anyhow;

use crate::{
    elements::contracts::{
        Artifact, ContractKind, ContractRegistry, InitializePackedParameters, ProxyAdmin,
        XagonZkEVM, XagonZkEVMBridge, XagonZkEVMDeployer, XagonZkEVMGlobalExitRoot,
        XagonZkEVMTimelock,
    },
    errors::DeployError,
};

use super::{
    address_from_word, compute_create2_address_evm, eip1967_admin_slot,
    eip1967_implementation_slot,
    network::{Chain, Inclusion, TxRequest},
};

const CREATION_MARKER: u8 = 0xfe;
const RUNTIME_MARKER: u8 = 0xfd;

fn kind_index(kind: ContractKind) -> u8 {
    ContractKind::ALL
        .iter()
        .position(|k| *k == kind)
        .expect("every kind is listed") as u8
}

/// Registry whose artifacts the mock chain knows how to "execute".
pub(crate) fn test_registry() -> ContractRegistry {
    let artifacts = ContractKind::ALL
        .into_iter()
        .map(|kind| {
            let index = kind_index(kind);
            let artifact = Artifact {
                contract_name: kind.artifact_name().to_string(),
                abi: Default::default(),
                bytecode: vec![CREATION_MARKER, index].into(),
                deployed_bytecode: vec![RUNTIME_MARKER, index].into(),
            };
            (kind, artifact)
        })
        .collect();
    ContractRegistry::from_artifacts(artifacts).unwrap()
}

fn split_init_code(init_code: &[u8]) -> Option<(ContractKind, &[u8])> {
    match init_code {
        [CREATION_MARKER, index, args @ ..] => {
            ContractKind::ALL.get(*index as usize).map(|kind| (*kind, args))
        }
        _ => None,
    }
}

fn returns<T: SolValue>(value: T) -> Bytes {
    (value,).abi_encode_params().into()
}

#[derive(Debug, Clone, Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    kinds: HashMap<Address, ContractKind>,
    getters: HashMap<Address, HashMap<Vec<u8>, Bytes>>,
    storage: HashMap<(Address, B256), B256>,
    block_number: u64,
    requests: usize,
    transport_failures: u32,
    creation_failures: HashMap<ContractKind, u32>,
}

impl MockState {
    fn set_getter<T: SolCall>(&mut self, address: Address, call: T, value: Bytes) {
        self.getters
            .entry(address)
            .or_default()
            .insert(call.abi_encode(), value);
    }

    fn read(&self, to: Address, input: &[u8]) -> Option<Bytes> {
        if let Some(value) = self.getters.get(&to).and_then(|g| g.get(input)) {
            return Some(value.clone());
        }
        // Anything the proxy does not answer itself is served by its implementation.
        let implementation = self.storage.get(&(to, eip1967_implementation_slot()))?;
        let implementation = address_from_word(*implementation);
        self.getters.get(&implementation)?.get(input).cloned()
    }

    fn owner_of(&self, address: Address) -> Option<Address> {
        let raw = self.read(address, &ProxyAdmin::ownerCall {}.abi_encode())?;
        Address::abi_decode(&raw, true).ok()
    }

    fn deploy(&mut self, creator: Address, address: Address, init_code: &[u8]) -> Result<(), String> {
        if self.code.get(&address).is_some_and(|code| !code.is_empty()) {
            return Err("Create2: Failed on deploy".to_string());
        }
        let Some((kind, args)) = split_init_code(init_code) else {
            self.code.insert(address, Bytes::copy_from_slice(init_code));
            return Ok(());
        };
        self.code
            .insert(address, vec![RUNTIME_MARKER, kind_index(kind)].into());
        self.kinds.insert(address, kind);

        let bad_args = |err: alloy::sol_types::Error| format!("{kind} constructor: {err}");
        match kind {
            ContractKind::Deployer | ContractKind::ProxyAdmin => {
                self.set_getter(address, ProxyAdmin::ownerCall {}, returns(creator));
            }
            ContractKind::TransparentProxy => {
                let (logic, admin, data) =
                    <(Address, Address, Bytes)>::abi_decode_params(args, true).map_err(bad_args)?;
                self.storage
                    .insert((address, eip1967_implementation_slot()), logic.into_word());
                self.storage
                    .insert((address, eip1967_admin_slot()), admin.into_word());
                if !data.is_empty() {
                    self.execute(creator, address, &data)?;
                }
            }
            ContractKind::GlobalExitRoot => {
                let (rollup, bridge) =
                    <(Address, Address)>::abi_decode_params(args, true).map_err(bad_args)?;
                self.set_getter(
                    address,
                    XagonZkEVMGlobalExitRoot::rollupAddressCall {},
                    returns(rollup),
                );
                self.set_getter(
                    address,
                    XagonZkEVMGlobalExitRoot::bridgeAddressCall {},
                    returns(bridge),
                );
            }
            ContractKind::Rollup => {
                let (ger, fee_token, verifier, bridge, chain_id, fork_id) =
                    <(Address, Address, Address, Address, u64, u64)>::abi_decode_params(args, true)
                        .map_err(bad_args)?;
                self.set_getter(address, XagonZkEVM::globalExitRootManagerCall {}, returns(ger));
                self.set_getter(address, XagonZkEVM::maticCall {}, returns(fee_token));
                self.set_getter(address, XagonZkEVM::rollupVerifierCall {}, returns(verifier));
                self.set_getter(address, XagonZkEVM::bridgeAddressCall {}, returns(bridge));
                self.set_getter(address, XagonZkEVM::chainIDCall {}, returns(chain_id));
                self.set_getter(address, XagonZkEVM::forkIDCall {}, returns(fork_id));
            }
            ContractKind::Timelock => {
                let (min_delay, _proposers, _executors, _admin, rollup) =
                    <(U256, Vec<Address>, Vec<Address>, Address, Address)>::abi_decode_params(
                        args, true,
                    )
                    .map_err(bad_args)?;
                self.set_getter(address, XagonZkEVMTimelock::getMinDelayCall {}, returns(min_delay));
                self.set_getter(address, XagonZkEVMTimelock::xagonZkEVMCall {}, returns(rollup));
            }
            ContractKind::FflonkVerifier | ContractKind::VerifierMock | ContractKind::Bridge => {}
        }
        Ok(())
    }

    fn execute(&mut self, caller: Address, to: Address, input: &[u8]) -> Result<(), String> {
        if input.len() < 4 {
            return Err("missing selector".to_string());
        }
        let selector: [u8; 4] = input[..4].try_into().map_err(|_| "selector")?;
        let bad_call = |err: alloy::sol_types::Error| format!("call decoding: {err}");

        match selector {
            XagonZkEVMDeployer::deployDeterministicCall::SELECTOR => {
                let call = XagonZkEVMDeployer::deployDeterministicCall::abi_decode(input, true)
                    .map_err(bad_call)?;
                self.ensure_owner(caller, to)?;
                let address = compute_create2_address_evm(to, call.salt, keccak256(&call.initBytecode));
                self.deploy(to, address, &call.initBytecode)
            }
            XagonZkEVMDeployer::deployDeterministicAndCallCall::SELECTOR => {
                let call =
                    XagonZkEVMDeployer::deployDeterministicAndCallCall::abi_decode(input, true)
                        .map_err(bad_call)?;
                self.ensure_owner(caller, to)?;
                let address = compute_create2_address_evm(to, call.salt, keccak256(&call.initBytecode));
                self.deploy(to, address, &call.initBytecode)?;
                self.execute(to, address, &call.dataCall)
            }
            ProxyAdmin::transferOwnershipCall::SELECTOR => {
                let call =
                    ProxyAdmin::transferOwnershipCall::abi_decode(input, true).map_err(bad_call)?;
                self.ensure_owner(caller, to)?;
                self.set_getter(to, ProxyAdmin::ownerCall {}, returns(call.newOwner));
                Ok(())
            }
            XagonZkEVMBridge::initializeCall::SELECTOR => {
                let call =
                    XagonZkEVMBridge::initializeCall::abi_decode(input, true).map_err(bad_call)?;
                if self.read(to, &XagonZkEVMBridge::globalExitRootManagerCall {}.abi_encode()).is_some() {
                    return Err("Initializable: contract is already initialized".to_string());
                }
                self.set_getter(to, XagonZkEVMBridge::networkIDCall {}, returns(call._networkID));
                self.set_getter(
                    to,
                    XagonZkEVMBridge::globalExitRootManagerCall {},
                    returns(call._globalExitRootManager),
                );
                self.set_getter(
                    to,
                    XagonZkEVMBridge::xagonZkEVMaddressCall {},
                    returns(call._xagonZkEVMaddress),
                );
                Ok(())
            }
            XagonZkEVM::initializeCall::SELECTOR => {
                let call = XagonZkEVM::initializeCall::abi_decode(input, true).map_err(bad_call)?;
                let InitializePackedParameters {
                    admin,
                    trustedSequencer,
                    pendingStateTimeout,
                    trustedAggregator,
                    trustedAggregatorTimeout,
                } = call.initializePackedParameters;
                self.set_getter(to, XagonZkEVM::ownerCall {}, returns(caller));
                self.set_getter(to, XagonZkEVM::adminCall {}, returns(admin));
                self.set_getter(to, XagonZkEVM::trustedSequencerCall {}, returns(trustedSequencer));
                self.set_getter(
                    to,
                    XagonZkEVM::pendingStateTimeoutCall {},
                    returns(pendingStateTimeout),
                );
                self.set_getter(to, XagonZkEVM::trustedAggregatorCall {}, returns(trustedAggregator));
                self.set_getter(
                    to,
                    XagonZkEVM::trustedAggregatorTimeoutCall {},
                    returns(trustedAggregatorTimeout),
                );
                self.set_getter(
                    to,
                    XagonZkEVM::batchNumToStateRootCall { batchNum: 0 },
                    returns(call.genesisRoot),
                );
                self.set_getter(
                    to,
                    XagonZkEVM::trustedSequencerURLCall {},
                    returns(call._trustedSequencerURL),
                );
                self.set_getter(to, XagonZkEVM::networkNameCall {}, returns(call._networkName));
                Ok(())
            }
            _ => Err(format!("unknown selector 0x{}", alloy::hex::encode(selector))),
        }
    }

    fn ensure_owner(&self, caller: Address, contract: Address) -> Result<(), String> {
        match self.owner_of(contract) {
            Some(owner) if owner == caller => Ok(()),
            _ => Err("Ownable: caller is not the owner".to_string()),
        }
    }
}

/// Single-account chain that mines every transaction instantly. Clones share
/// the same chain.
#[derive(Clone)]
pub(crate) struct MockChain {
    sender: Address,
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub(crate) fn new(sender: Address) -> Self {
        Self {
            sender,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Puts a deployer contract owned by `owner` at `address`, outside of any transaction.
    ///
    /// When `address` is the next CREATE address of `owner`, the owner's nonce
    /// is spent as if it had deployed the contract itself.
    pub(crate) fn install_deployer_contract(&self, address: Address, owner: Address) {
        let mut state = self.state();
        state
            .deploy(owner, address, &[CREATION_MARKER, kind_index(ContractKind::Deployer)])
            .unwrap();
        let nonce = state.nonces.get(&owner).copied().unwrap_or_default();
        if owner.create(nonce) == address {
            state.nonces.insert(owner, nonce + 1);
        }
    }

    /// Every RPC round-trip made so far.
    pub(crate) fn requests(&self) -> usize {
        self.state().requests
    }

    /// The next `count` transactions fail before reaching the node.
    pub(crate) fn fail_next_sends(&self, count: u32) {
        self.state().transport_failures = count;
    }

    /// The next `count` creations of `kind` (plain CREATE only) fail before
    /// reaching the node.
    pub(crate) fn fail_creations_of(&self, kind: ContractKind, count: u32) {
        self.state().creation_failures.insert(kind, count);
    }

    pub(crate) fn kind_at(&self, address: Address) -> Option<ContractKind> {
        self.state().kinds.get(&address).copied()
    }

    pub(crate) fn set_storage(&self, address: Address, slot: B256, value: B256) {
        self.state().storage.insert((address, slot), value);
    }
}

impl Chain for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        let mut state = self.state();
        state.requests += 1;
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        let mut state = self.state();
        state.requests += 1;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn storage_at(&self, address: Address, slot: B256) -> anyhow::Result<B256> {
        let mut state = self.state();
        state.requests += 1;
        Ok(state.storage.get(&(address, slot)).copied().unwrap_or_default())
    }

    async fn call(&self, to: Address, input: Bytes) -> anyhow::Result<Bytes> {
        let mut state = self.state();
        state.requests += 1;
        state
            .read(to, &input)
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn simulate_create(&self, init_code: Bytes) -> anyhow::Result<Bytes> {
        let mut state = self.state();
        state.requests += 1;
        Ok(match split_init_code(&init_code) {
            Some((kind, _)) => vec![RUNTIME_MARKER, kind_index(kind)].into(),
            None => init_code,
        })
    }

    async fn send(&self, tx: TxRequest) -> anyhow::Result<Inclusion> {
        let mut state = self.state();
        state.requests += 1;

        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            anyhow::bail!("error sending request: connection reset by peer");
        }
        if tx.to.is_none() {
            if let Some((kind, _)) = split_init_code(&tx.input) {
                if let Some(left) = state.creation_failures.get_mut(&kind).filter(|n| **n > 0) {
                    *left -= 1;
                    anyhow::bail!("error sending request: connection reset by peer");
                }
            }
        }

        let nonce = state.nonces.get(&self.sender).copied().unwrap_or_default();
        state.block_number += 1;
        let block_number = state.block_number;
        let tx_hash = keccak256((self.sender, nonce).abi_encode_params());

        let mut next = state.clone();
        let (outcome, contract_address) = match tx.to {
            None => {
                let address = self.sender.create(nonce);
                (next.deploy(self.sender, address, &tx.input), Some(address))
            }
            Some(to) => (next.execute(self.sender, to, &tx.input), None),
        };
        if outcome.is_ok() {
            *state = next;
        }
        // Mined either way, so the nonce is spent.
        state.nonces.insert(self.sender, nonce + 1);

        match outcome {
            Ok(()) => Ok(Inclusion {
                tx_hash,
                block_number,
                contract_address,
            }),
            Err(reason) => {
                Err(anyhow::Error::new(DeployError::Reverted(tx_hash)).context(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_transactions_keep_the_nonce() {
        let chain = MockChain::new(Address::repeat_byte(0x42));
        chain.fail_next_sends(2);
        assert!(chain.send(TxRequest::create(vec![0x00u8])).await.is_err());
        assert!(chain.send(TxRequest::create(vec![0x00u8])).await.is_err());
        assert_eq!(chain.transaction_count(chain.sender()).await.unwrap(), 0);

        // A revert is mined, so it spends the nonce.
        let err = chain
            .send(TxRequest::call(Address::repeat_byte(1), vec![0u8; 4]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::Reverted(_))
        ));
        assert_eq!(chain.transaction_count(chain.sender()).await.unwrap(), 1);
        assert_eq!(chain.requests(), 5);
    }

    #[tokio::test]
    async fn self_deployed_factory_spends_the_first_nonce() {
        let owner = Address::repeat_byte(0x42);
        let chain = MockChain::new(owner);
        let factory = owner.create(0);
        chain.install_deployer_contract(factory, owner);
        assert_eq!(chain.transaction_count(owner).await.unwrap(), 1);

        let created = chain.send(TxRequest::create(vec![0x00u8])).await.unwrap();
        assert_eq!(created.contract_address, Some(owner.create(1)));
        assert_eq!(chain.kind_at(factory), Some(ContractKind::Deployer));

        // A factory the owner never created leaves the nonce alone.
        let other = MockChain::new(owner);
        other.install_deployer_contract(Address::repeat_byte(0x99), owner);
        assert_eq!(other.transaction_count(owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn proxy_reads_fall_through_to_implementation() {
        let chain = MockChain::new(Address::repeat_byte(0x42));
        let implementation = Address::repeat_byte(0x10);
        let proxy = Address::repeat_byte(0x20);
        chain.state().set_getter(
            implementation,
            XagonZkEVM::forkIDCall {},
            returns(6u64),
        );
        chain.set_storage(proxy, eip1967_implementation_slot(), implementation.into_word());

        let raw = chain
            .call(proxy, XagonZkEVM::forkIDCall {}.abi_encode().into())
            .await
            .unwrap();
        assert_eq!(XagonZkEVM::forkIDCall::abi_decode_returns(&raw, true).unwrap()._0, 6);
    }
}

use std::{collections::HashMap, fmt, path::Path};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::JsonAbi,
    primitives::{Address, Bytes},
    sol,
    sol_types::SolCall,
};
use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::{
    errors::DeployError,
    utils::{
        network::{Chain, Inclusion, TxRequest},
        read_structured_file,
    },
};

sol! {
    contract XagonZkEVMDeployer {
        function owner() external view returns (address);
        function deployDeterministic(uint256 amount, bytes32 salt, bytes initBytecode) external payable;
        function deployDeterministicAndCall(uint256 amount, bytes32 salt, bytes initBytecode, bytes dataCall) external payable;
    }

    contract ProxyAdmin {
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
        function upgrade(address proxy, address implementation) external;
        function upgradeAndCall(address proxy, address implementation, bytes data) external payable;
    }

    contract TransparentUpgradeableProxy {
        constructor(address _logic, address admin_, bytes _data);
    }

    contract XagonZkEVMBridge {
        function initialize(uint32 _networkID, address _globalExitRootManager, address _xagonZkEVMaddress) external;
        function globalExitRootManager() external view returns (address);
        function xagonZkEVMaddress() external view returns (address);
        function networkID() external view returns (uint32);
    }

    contract XagonZkEVMGlobalExitRoot {
        constructor(address _rollupAddress, address _bridgeAddress);
        function rollupAddress() external view returns (address);
        function bridgeAddress() external view returns (address);
    }

    struct InitializePackedParameters {
        address admin;
        address trustedSequencer;
        uint64 pendingStateTimeout;
        address trustedAggregator;
        uint64 trustedAggregatorTimeout;
    }

    contract XagonZkEVM {
        constructor(
            address _globalExitRootManager,
            address _matic,
            address _rollupVerifier,
            address _bridgeAddress,
            uint64 _chainID,
            uint64 _forkID
        );
        function initialize(
            InitializePackedParameters initializePackedParameters,
            bytes32 genesisRoot,
            string _trustedSequencerURL,
            string _networkName,
            string _version
        ) external;
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
        function globalExitRootManager() external view returns (address);
        function matic() external view returns (address);
        function rollupVerifier() external view returns (address);
        function bridgeAddress() external view returns (address);
        function admin() external view returns (address);
        function chainID() external view returns (uint64);
        function forkID() external view returns (uint64);
        function trustedSequencer() external view returns (address);
        function pendingStateTimeout() external view returns (uint64);
        function trustedAggregator() external view returns (address);
        function trustedAggregatorTimeout() external view returns (uint64);
        function batchNumToStateRoot(uint64 batchNum) external view returns (bytes32);
        function trustedSequencerURL() external view returns (string);
        function networkName() external view returns (string);
    }

    contract XagonZkEVMTimelock {
        constructor(
            uint256 minDelay,
            address[] proposers,
            address[] executors,
            address admin,
            address _xagonZkEVM
        );
        function getMinDelay() external view returns (uint256);
        function xagonZkEVM() external view returns (address);
        function schedule(address target, uint256 value, bytes data, bytes32 predecessor, bytes32 salt, uint256 delay) external;
        function execute(address target, uint256 value, bytes payload, bytes32 predecessor, bytes32 salt) external payable;
    }
}

/// Every contract the deployment touches, by its artifact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractKind {
    FflonkVerifier,
    VerifierMock,
    Deployer,
    ProxyAdmin,
    TransparentProxy,
    Bridge,
    GlobalExitRoot,
    Rollup,
    Timelock,
}

impl ContractKind {
    pub const ALL: [ContractKind; 9] = [
        ContractKind::FflonkVerifier,
        ContractKind::VerifierMock,
        ContractKind::Deployer,
        ContractKind::ProxyAdmin,
        ContractKind::TransparentProxy,
        ContractKind::Bridge,
        ContractKind::GlobalExitRoot,
        ContractKind::Rollup,
        ContractKind::Timelock,
    ];

    pub fn artifact_name(&self) -> &'static str {
        match self {
            ContractKind::FflonkVerifier => "FflonkVerifier",
            ContractKind::VerifierMock => "VerifierRollupHelperMock",
            ContractKind::Deployer => "XagonZkEVMDeployer",
            ContractKind::ProxyAdmin => "ProxyAdmin",
            ContractKind::TransparentProxy => "TransparentUpgradeableProxy",
            ContractKind::Bridge => "XagonZkEVMBridge",
            ContractKind::GlobalExitRoot => "XagonZkEVMGlobalExitRoot",
            ContractKind::Rollup => "XagonZkEVM",
            ContractKind::Timelock => "XagonZkEVMTimelock",
        }
    }

    pub fn verifier(real_verifier: bool) -> Self {
        if real_verifier {
            ContractKind::FflonkVerifier
        } else {
            ContractKind::VerifierMock
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact_name())
    }
}

/// Hardhat compilation artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    pub deployed_bytecode: Bytes,
}

impl Artifact {
    pub fn load(dir: &Path, name: &str) -> anyhow::Result<Self> {
        let path = dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(DeployError::MissingArtifact(path).into());
        }
        read_structured_file(&path)
    }

    /// Creation code followed by already encoded constructor arguments.
    pub fn creation_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(constructor_args);
        code.into()
    }

    /// Encodes constructor arguments given as loosely typed JSON values.
    pub fn encode_constructor_args(&self, args: &[serde_json::Value]) -> anyhow::Result<Vec<u8>> {
        let Some(constructor) = &self.abi.constructor else {
            anyhow::ensure!(
                args.is_empty(),
                "{} has no constructor but {} arguments were given",
                self.contract_name,
                args.len()
            );
            return Ok(vec![]);
        };
        let types = constructor
            .inputs
            .iter()
            .map(|param| param.resolve())
            .collect::<Result<Vec<_>, _>>()?;
        let values = coerce_json_args(&types, args)
            .with_context(|| format!("{} constructor", self.contract_name))?;
        Ok(constructor.abi_encode_input(&values)?)
    }

    /// Calldata (selector included) for the first overload of `function_name`.
    pub fn encode_function_call(
        &self,
        function_name: &str,
        args: &[serde_json::Value],
    ) -> anyhow::Result<Vec<u8>> {
        let function = self
            .abi
            .function(function_name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| anyhow!("{} has no function {function_name}", self.contract_name))?;
        let types = function
            .inputs
            .iter()
            .map(|param| param.resolve())
            .collect::<Result<Vec<_>, _>>()?;
        let values = coerce_json_args(&types, args)
            .with_context(|| format!("{}.{function_name}", self.contract_name))?;
        Ok(function.abi_encode_input(&values)?)
    }
}

fn coerce_json_args(
    types: &[DynSolType],
    args: &[serde_json::Value],
) -> anyhow::Result<Vec<DynSolValue>> {
    anyhow::ensure!(
        types.len() == args.len(),
        "expected {} arguments, got {}",
        types.len(),
        args.len()
    );
    types
        .iter()
        .zip(args)
        .map(|(ty, arg)| {
            let text = match arg {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            ty.coerce_str(&text)
                .with_context(|| format!("cannot read {text} as {ty}"))
        })
        .collect()
}

/// Artifacts for every [ContractKind], resolved once at startup.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    artifacts: HashMap<ContractKind, Artifact>,
}

impl ContractRegistry {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut artifacts = HashMap::new();
        for kind in ContractKind::ALL {
            artifacts.insert(kind, Artifact::load(dir, kind.artifact_name())?);
        }
        Ok(Self { artifacts })
    }

    pub fn from_artifacts(artifacts: HashMap<ContractKind, Artifact>) -> anyhow::Result<Self> {
        for kind in ContractKind::ALL {
            anyhow::ensure!(artifacts.contains_key(&kind), "missing artifact for {kind}");
        }
        Ok(Self { artifacts })
    }

    pub fn artifact(&self, kind: ContractKind) -> &Artifact {
        // Presence of every kind is checked on construction.
        &self.artifacts[&kind]
    }

    pub fn creation_code(&self, kind: ContractKind, constructor_args: &[u8]) -> Bytes {
        self.artifact(kind).creation_code(constructor_args)
    }

    pub fn bind<'c, C: Chain>(
        &self,
        kind: ContractKind,
        address: Address,
        chain: &'c C,
    ) -> BoundContract<'c, C> {
        BoundContract {
            kind,
            address,
            chain,
        }
    }
}

/// A deployed contract reached through a [Chain], with typed calls.
pub struct BoundContract<'c, C> {
    pub kind: ContractKind,
    pub address: Address,
    chain: &'c C,
}

impl<C: Chain> BoundContract<'_, C> {
    pub async fn read<T: SolCall>(&self, call: T) -> anyhow::Result<T::Return> {
        let output = self
            .chain
            .call(self.address, call.abi_encode().into())
            .await
            .with_context(|| format!("{}.{} on {}", self.kind, T::SIGNATURE, self.address))?;
        T::abi_decode_returns(&output, true).with_context(|| {
            format!(
                "Decoding {}.{} returned by {}",
                self.kind,
                T::SIGNATURE,
                self.address
            )
        })
    }

    pub async fn transact<T: SolCall>(&self, call: T) -> anyhow::Result<Inclusion> {
        self.chain
            .send(TxRequest::call(self.address, call.abi_encode()))
            .await
            .with_context(|| format!("{}.{} on {}", self.kind, T::SIGNATURE, self.address))
    }
}

use std::cell::Cell;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolConstructor;
use anyhow::Context;

use crate::{
    elements::contracts::{ContractKind, ContractRegistry, TransparentUpgradeableProxy},
    utils::network::{Chain, TxRequest},
};

/// A transparent proxy together with the implementation it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyDeployment {
    pub proxy: Address,
    pub implementation: Address,
    /// Block the proxy creation was mined in.
    pub block_number: u64,
}

/// An implementation of `kind` with a transparent proxy in front of it,
/// administered by `proxy_admin` and initialized with `init_data`.
///
/// A successful [TransparentProxyDeployment::attempt] spends two nonces of the
/// sender: implementation first, proxy second. The implementation is kept once
/// mined, so an attempt after a failed proxy creation only resends the proxy
/// and the proxy still lands on the nonce right after the implementation.
pub struct TransparentProxyDeployment<'a, C> {
    chain: &'a C,
    registry: &'a ContractRegistry,
    kind: ContractKind,
    constructor_args: Vec<u8>,
    proxy_admin: Address,
    init_data: Bytes,
    implementation: Cell<Option<Address>>,
}

impl<'a, C: Chain> TransparentProxyDeployment<'a, C> {
    pub fn new(
        chain: &'a C,
        registry: &'a ContractRegistry,
        kind: ContractKind,
        constructor_args: Vec<u8>,
        proxy_admin: Address,
        init_data: Bytes,
    ) -> Self {
        Self {
            chain,
            registry,
            kind,
            constructor_args,
            proxy_admin,
            init_data,
            implementation: Cell::new(None),
        }
    }

    /// Implementation mined by an earlier attempt, if any.
    pub fn implementation(&self) -> Option<Address> {
        self.implementation.get()
    }

    pub async fn attempt(&self) -> anyhow::Result<ProxyDeployment> {
        let kind = self.kind;
        let implementation = match self.implementation.get() {
            Some(implementation) => implementation,
            None => {
                let implementation = self
                    .chain
                    .send(TxRequest::create(
                        self.registry.creation_code(kind, &self.constructor_args),
                    ))
                    .await
                    .with_context(|| format!("{kind} implementation"))?
                    .contract_address
                    .with_context(|| {
                        format!("{kind} implementation receipt has no contract address")
                    })?;
                self.implementation.set(Some(implementation));
                implementation
            }
        };

        let proxy_args = TransparentUpgradeableProxy::constructorCall {
            _logic: implementation,
            admin_: self.proxy_admin,
            _data: self.init_data.clone(),
        }
        .abi_encode();
        let inclusion = self
            .chain
            .send(TxRequest::create(
                self.registry
                    .creation_code(ContractKind::TransparentProxy, &proxy_args),
            ))
            .await
            .with_context(|| format!("{kind} proxy"))?;
        let proxy = inclusion
            .contract_address
            .with_context(|| format!("{kind} proxy receipt has no contract address"))?;

        Ok(ProxyDeployment {
            proxy,
            implementation,
            block_number: inclusion.block_number,
        })
    }
}

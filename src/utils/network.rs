use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{
    utils::{parse_units, ParseUnits},
    Address, Bytes, FixedBytes, TxHash, B256, U256,
};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use alloy::transports::http::Http;
use anyhow::Context;
use reqwest::Client;

use crate::errors::DeployError;

/// A transaction the deployer wants mined. `to == None` means contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Option<Address>,
    pub input: Bytes,
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn create(init_code: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            input: init_code.into(),
            gas_limit: None,
        }
    }

    pub fn call(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            input: input.into(),
            gas_limit: None,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

/// What we keep from a successful receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub contract_address: Option<Address>,
}

/// The slice of an Ethereum node the deployment tooling talks to.
///
/// Every method is one awaited round-trip. `send` only returns once the
/// transaction is mined; a reverted receipt is an error.
#[allow(async_fn_in_trait)]
pub trait Chain {
    /// Account that signs every transaction sent through [Chain::send].
    fn sender(&self) -> Address;

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64>;

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes>;

    async fn storage_at(&self, address: Address, slot: B256) -> anyhow::Result<B256>;

    async fn call(&self, to: Address, input: Bytes) -> anyhow::Result<Bytes>;

    /// Runs `init_code` as a creation without mining it and returns the runtime code.
    async fn simulate_create(&self, init_code: Bytes) -> anyhow::Result<Bytes>;

    async fn send(&self, tx: TxRequest) -> anyhow::Result<Inclusion>;
}

/// Fee policy for sent transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GasSettings {
    /// Whatever the provider estimates.
    #[default]
    Estimated,
    /// Fixed EIP-1559 fees, in wei.
    Fixed {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    /// Estimated fees scaled by `multiplier / 1000`.
    Multiplier(u64),
}

pub struct AlloyChain<P> {
    provider: P,
    sender: Address,
    gas: GasSettings,
}

impl AlloyChain<()> {
    /// Connects to `rpc_url` with a local signing key.
    pub fn connect(
        rpc_url: &str,
        signer: PrivateKeySigner,
        gas: GasSettings,
    ) -> anyhow::Result<AlloyChain<impl Provider<Http<Client>, Ethereum>>> {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(rpc_url.parse().context("Invalid RPC url")?);

        Ok(AlloyChain {
            provider,
            sender,
            gas,
        })
    }
}

impl<P: Provider<Http<Client>, Ethereum>> AlloyChain<P> {
    async fn apply_gas(&self, mut request: TransactionRequest) -> anyhow::Result<TransactionRequest> {
        match self.gas {
            GasSettings::Estimated => {}
            GasSettings::Fixed {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                request = request
                    .with_max_fee_per_gas(max_fee_per_gas)
                    .with_max_priority_fee_per_gas(max_priority_fee_per_gas);
            }
            GasSettings::Multiplier(multiplier) => {
                let fees = self.provider.estimate_eip1559_fees(None).await?;
                request = request
                    .with_max_fee_per_gas(fees.max_fee_per_gas * multiplier as u128 / 1000)
                    .with_max_priority_fee_per_gas(
                        fees.max_priority_fee_per_gas * multiplier as u128 / 1000,
                    );
            }
        }
        Ok(request)
    }
}

impl<P: Provider<Http<Client>, Ethereum>> Chain for AlloyChain<P> {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn storage_at(&self, address: Address, slot: B256) -> anyhow::Result<B256> {
        let storage = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await?;

        Ok(FixedBytes::from_slice(&storage.to_be_bytes_vec()))
    }

    async fn call(&self, to: Address, input: Bytes) -> anyhow::Result<Bytes> {
        let request = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(input);
        Ok(self.provider.call(&request).await?)
    }

    async fn simulate_create(&self, init_code: Bytes) -> anyhow::Result<Bytes> {
        let request = TransactionRequest::default()
            .with_from(self.sender)
            .with_deploy_code(init_code);
        Ok(self.provider.call(&request).await?)
    }

    async fn send(&self, tx: TxRequest) -> anyhow::Result<Inclusion> {
        let mut request = TransactionRequest::default().with_from(self.sender);
        request = match tx.to {
            Some(to) => request.with_to(to).with_input(tx.input),
            None => request.with_deploy_code(tx.input),
        };
        if let Some(gas_limit) = tx.gas_limit {
            request = request.with_gas_limit(gas_limit);
        }
        let request = self.apply_gas(request).await?;

        let receipt = self
            .provider
            .send_transaction(request)
            .await?
            .get_receipt()
            .await?;

        if !receipt.status() {
            return Err(DeployError::Reverted(receipt.transaction_hash).into());
        }

        Ok(Inclusion {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            contract_address: receipt.contract_address,
        })
    }
}

/// Picks the signing key: an explicit private key first (parameters file,
/// then command line), then account 0 of the mnemonic.
pub fn resolve_signer(
    private_keys: &[Option<&str>],
    mnemonic: Option<&str>,
) -> anyhow::Result<PrivateKeySigner> {
    if let Some(key) = private_keys.iter().flatten().find(|key| !key.is_empty()) {
        return key.parse().context("Invalid private key");
    }
    match mnemonic.filter(|phrase| !phrase.is_empty()) {
        Some(phrase) => Ok(MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(0)?
            .build()
            .context("Invalid mnemonic")?),
        None => Err(DeployError::MissingSigner.into()),
    }
}

/// Gwei decimal string (as used in parameter files) to wei.
pub fn parse_gwei(value: &str) -> anyhow::Result<u128> {
    let wei = parse_units(value, "gwei").with_context(|| format!("Invalid gwei amount: {value}"))?;
    if let ParseUnits::I256(signed) = &wei {
        anyhow::ensure!(!signed.is_negative(), "Negative gwei amount: {value}");
    }
    wei.get_absolute()
        .try_into()
        .with_context(|| format!("Gwei amount out of range: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gwei_strings_to_wei() {
        assert_eq!(parse_gwei("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_gwei("0.5").unwrap(), 500_000_000);
        assert!(parse_gwei("lots").is_err());
        assert!(parse_gwei("-1").is_err());
        assert!(parse_gwei("-0.5").unwrap_err().to_string().contains("Negative"));
    }

    const HARDHAT_MNEMONIC: &str = "test test test test test test test test test test test junk";
    const HARDHAT_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const HARDHAT_KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn signer_precedence() {
        let from_file = resolve_signer(&[Some(HARDHAT_KEY_1), Some(HARDHAT_KEY_0)], Some(HARDHAT_MNEMONIC))
            .unwrap();
        assert_eq!(
            from_file.address(),
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse::<Address>().unwrap()
        );

        let from_mnemonic = resolve_signer(&[Some(""), None], Some(HARDHAT_MNEMONIC)).unwrap();
        assert_eq!(
            from_mnemonic.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );

        let err = resolve_signer(&[None, None], None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::MissingSigner)
        ));
    }

    #[test]
    fn request_builders() {
        let create = TxRequest::create(vec![0x60u8]);
        assert_eq!(create.to, None);
        let call = TxRequest::call(Address::ZERO, vec![1u8]).with_gas_limit(Some(5_500_000));
        assert_eq!(call.to, Some(Address::ZERO));
        assert_eq!(call.gas_limit, Some(5_500_000));
    }
}

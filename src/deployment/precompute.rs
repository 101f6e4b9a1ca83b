use alloy::primitives::Address;

use crate::utils::{compute_create_address, network::Chain};

/// Address a CREATE from `account` will get once its nonce reaches `nonce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecomputedAddress {
    pub address: Address,
    pub nonce: u64,
}

/// Predicts the address of the contract created by the `offset`-th next
/// transaction of `account`, counting from its current transaction count.
///
/// The prediction only holds while nothing else spends nonces of `account`
/// before that transaction is sent.
pub async fn precompute_address<C: Chain>(
    chain: &C,
    account: Address,
    offset: u64,
) -> anyhow::Result<PrecomputedAddress> {
    let nonce = chain.transaction_count(account).await? + offset;
    Ok(PrecomputedAddress {
        address: compute_create_address(account, nonce),
        nonce,
    })
}

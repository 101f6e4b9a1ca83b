//! Prepares timelock-gated proxy upgrades.
//!
//! New implementations are deployed right away. The upgrade itself is only
//! encoded: the timelock proposers schedule it and execute it later.

use std::path::{Path, PathBuf};

use alloy::primitives::B256;
use anyhow::Context;

use crate::{
    elements::{
        contracts::Artifact,
        manifest::ManifestFile,
        upgrade::{TimelockOperation, UpgradeOutputEntry, UpgradeParameters},
    },
    utils::{
        network::{Chain, TxRequest},
        write_json_atomically,
    },
};

pub fn upgrade_output_path(dir: &Path, timestamp: i64) -> PathBuf {
    dir.join(format!("upgrade_output_{timestamp}.json"))
}

/// Deploys one implementation per requested upgrade and returns the timelock
/// calldata for each, in input order.
pub async fn prepare_upgrades<C: Chain>(
    chain: &C,
    artifacts_dir: &Path,
    manifest_path: &Path,
    params: &UpgradeParameters,
) -> anyhow::Result<Vec<UpgradeOutputEntry>> {
    let mut manifest = ManifestFile::open(manifest_path)?;
    let proxy_admin = manifest
        .manifest()
        .admin
        .with_context(|| format!("No proxy admin recorded in {}", manifest_path.display()))?;

    // Every artifact and proxy is checked before anything is deployed.
    let mut artifacts = Vec::with_capacity(params.upgrades.len());
    for upgrade in &params.upgrades {
        anyhow::ensure!(
            manifest.manifest().proxies.contains_key(&upgrade.address),
            "{} is not a proxy recorded in {}",
            upgrade.address,
            manifest_path.display()
        );
        artifacts.push(Artifact::load(artifacts_dir, &upgrade.contract_name)?);
    }

    let salt = params.timelock_salt.unwrap_or(B256::ZERO);
    let min_delay = params.timelock_min_delay.unwrap_or_default();
    let mut entries = Vec::with_capacity(params.upgrades.len());

    for (upgrade, artifact) in params.upgrades.iter().zip(&artifacts) {
        let constructor_args = artifact
            .encode_constructor_args(upgrade.constructor_args.as_deref().unwrap_or_default())?;
        let call_after = upgrade
            .call_after_upgrade
            .as_ref()
            .map(|call| artifact.encode_function_call(&call.function_name, &call.arguments))
            .transpose()?;

        let implementation = chain
            .send(TxRequest::create(artifact.creation_code(&constructor_args)))
            .await
            .with_context(|| format!("{} implementation deployment", upgrade.contract_name))?
            .contract_address
            .with_context(|| format!("{} receipt has no contract address", upgrade.contract_name))?;
        manifest.record_implementation(implementation, &upgrade.contract_name)?;
        log::info!(
            "New {} implementation for {} deployed to {implementation}",
            upgrade.contract_name,
            upgrade.address
        );

        let operation = TimelockOperation::upgrade_proxy(
            proxy_admin,
            upgrade.address,
            implementation,
            call_after.map(Into::into),
            salt,
        );
        entries.push(UpgradeOutputEntry {
            contract_name: upgrade.contract_name.clone(),
            proxy_address: upgrade.address,
            implementation_address: implementation,
            operation_id: operation.id(),
            schedule_data: operation.schedule_calldata(min_delay),
            execute_data: operation.execute_calldata(),
        });
    }

    Ok(entries)
}

/// Writes `entries` to `upgrade_output_<timestamp>.json` inside `dir`.
pub fn write_upgrade_output(
    dir: &Path,
    timestamp: i64,
    entries: &[UpgradeOutputEntry],
) -> anyhow::Result<PathBuf> {
    let path = upgrade_output_path(dir, timestamp);
    write_json_atomically(&path, &entries)?;
    Ok(path)
}

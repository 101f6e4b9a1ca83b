use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    errors::DeployError,
    utils::{read_structured_file, write_json_atomically},
};

/// Upgrade-safety bookkeeping for one network (`.openzeppelin/<network>.json`):
/// which proxies exist, who administers them and what implementation sits
/// behind each one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeManifest {
    #[serde(default)]
    pub admin: Option<Address>,
    #[serde(default)]
    pub proxies: BTreeMap<Address, ProxyRecord>,
    #[serde(default)]
    pub implementations: BTreeMap<Address, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRecord {
    pub contract_name: String,
    pub implementation: Address,
    pub kind: String,
}

pub fn manifest_path(dir: &Path, network: &str) -> PathBuf {
    dir.join(format!("{network}.json"))
}

/// A manifest file owned by a single deployment run.
#[derive(Debug)]
pub struct ManifestFile {
    path: PathBuf,
    manifest: UpgradeManifest,
}

impl ManifestFile {
    /// Starts tracking a new deployment. A leftover file from another run is a
    /// configuration error the operator has to clear by hand.
    pub fn create_fresh(path: &Path) -> Result<Self, DeployError> {
        if path.exists() {
            return Err(DeployError::StaleManifest(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            manifest: UpgradeManifest::default(),
        })
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            manifest: read_structured_file(path)?,
        })
    }

    pub fn manifest(&self) -> &UpgradeManifest {
        &self.manifest
    }

    /// Records (or re-imports) a transparent proxy and its admin.
    pub fn import_proxy(
        &mut self,
        proxy: Address,
        implementation: Address,
        admin: Address,
        contract_name: &str,
    ) -> anyhow::Result<()> {
        self.manifest.admin = Some(admin);
        self.manifest.proxies.insert(
            proxy,
            ProxyRecord {
                contract_name: contract_name.to_string(),
                implementation,
                kind: "transparent".to_string(),
            },
        );
        self.manifest
            .implementations
            .insert(implementation, contract_name.to_string());
        self.persist()
    }

    pub fn record_implementation(
        &mut self,
        implementation: Address,
        contract_name: &str,
    ) -> anyhow::Result<()> {
        self.manifest
            .implementations
            .insert(implementation, contract_name.to_string());
        self.persist()
    }

    fn persist(&self) -> anyhow::Result<()> {
        write_json_atomically(&self.path, &self.manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_manifest_blocks_new_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest_path(dir.path(), "sepolia");
        std::fs::write(&path, "{}").unwrap();

        match ManifestFile::create_fresh(&path) {
            Err(DeployError::StaleManifest(p)) => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn imported_proxies_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest_path(&dir.path().join(".openzeppelin"), "hardhat");

        let mut file = ManifestFile::create_fresh(&path).unwrap();
        file.import_proxy(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(9),
            "XagonZkEVMBridge",
        )
        .unwrap();
        file.record_implementation(Address::repeat_byte(3), "XagonZkEVMUpgraded")
            .unwrap();

        let reopened = ManifestFile::open(&path).unwrap();
        let manifest = reopened.manifest();
        assert_eq!(manifest.admin, Some(Address::repeat_byte(9)));
        assert_eq!(
            manifest.proxies[&Address::repeat_byte(1)].implementation,
            Address::repeat_byte(2)
        );
        assert_eq!(manifest.implementations.len(), 2);
    }
}

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use anyhow::Context;

use crate::utils::{read_structured_file, write_json_atomically};

pub const VERIFIER_CONTRACT: &str = "verifierContract";
pub const PROXY_ADMIN: &str = "proxyAdmin";
pub const BRIDGE_IMPLEMENTATION: &str = "xagonZkEVMBridgeImplementation";
pub const BRIDGE_PROXY: &str = "xagonZkEVMBridge";
pub const GLOBAL_EXIT_ROOT: &str = "xagonZkEVMGlobalExitRoot";
pub const ROLLUP_CONTRACT: &str = "xagonZkEVMContract";

/// Progress of an ongoing deployment (`deploy_ongoing.json`): logical contract
/// name to deployed address.
///
/// Every mutation rewrites the whole file. The file disappears once
/// [CheckpointStore::finalize] is called at the end of a complete run.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: BTreeMap<String, Address>,
}

impl CheckpointStore {
    /// Empty when no checkpoint file exists yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let entries = if path.exists() {
            read_structured_file(path)
                .with_context(|| format!("Corrupted ongoing deployment {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, Address> {
        &self.entries
    }

    pub fn record_step(&mut self, name: &str, address: Address) -> anyhow::Result<()> {
        self.entries.insert(name.to_string(), address);
        self.persist()
    }

    pub fn clear_entries(&mut self, names: &[&str]) -> anyhow::Result<()> {
        for name in names {
            self.entries.remove(*name);
        }
        self.persist()
    }

    /// Removes the checkpoint file. Only for a fully completed sequence.
    pub fn finalize(self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }

    fn persist(&self) -> anyhow::Result<()> {
        write_json_atomically(&self.path, &self.entries)
    }
}

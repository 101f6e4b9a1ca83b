use std::{fs, path::Path};

use alloy::{
    hex::FromHex,
    primitives::{keccak256, Address, FixedBytes, B256},
};
use anyhow::Context;
use serde::de::DeserializeOwned;

pub mod address_verifier;
pub mod bytecode_verifier;
pub mod network;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

/// `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`
pub const EIP1967_IMPLEMENTATION_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";
/// `bytes32(uint256(keccak256("eip1967.proxy.admin")) - 1)`
pub const EIP1967_PROXY_ADMIN_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

pub fn eip1967_implementation_slot() -> B256 {
    B256::from_hex(EIP1967_IMPLEMENTATION_SLOT).expect("constant slot is valid hex")
}

pub fn eip1967_admin_slot() -> B256 {
    B256::from_hex(EIP1967_PROXY_ADMIN_SLOT).expect("constant slot is valid hex")
}

/// Address of the contract created by `sender` with a plain CREATE at `nonce`.
pub fn compute_create_address(sender: Address, nonce: u64) -> Address {
    sender.create(nonce)
}

pub fn compute_create2_address_evm(
    sender: Address,
    salt: FixedBytes<32>,
    bytecode_hash: FixedBytes<32>,
) -> Address {
    let mut address_payload = vec![];
    address_payload.extend_from_slice(&[0xff_u8]);
    address_payload.extend_from_slice(sender.as_slice());

    // Extract salt
    address_payload.extend_from_slice(salt.as_slice());
    // And hash the rest.
    address_payload.extend_from_slice(bytecode_hash.as_slice());

    // compute create2 address
    Address::from_slice(&keccak256(address_payload).0[12..])
}

/// Storage words hold addresses right-aligned.
pub fn address_from_word(word: B256) -> Address {
    Address::from_slice(&word[12..])
}

/// Reads a JSON file, or a YAML one when the extension says so.
pub fn read_structured_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_structured(path, &content)
}

pub fn parse_structured<T: DeserializeOwned>(path: &Path, content: &str) -> anyhow::Result<T> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(content)
            .with_context(|| format!("Failed to parse YAML {}", path.display())),
        _ => serde_json::from_str(content)
            .with_context(|| format!("Failed to parse JSON {}", path.display())),
    }
}

/// Writes `value` as pretty JSON through a sibling temp file, so readers never
/// observe a half-written file.
pub fn write_json_atomically<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let data = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, data).with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, bytes};

    #[test]
    fn create_address_follows_sender_nonce() {
        // Well known anvil account #0 deployments.
        let sender = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(
            compute_create_address(sender, 0),
            address!("5FbDB2315678afecb367f032d93F642f64180aa3")
        );
        assert_eq!(
            compute_create_address(sender, 1),
            address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512")
        );
    }

    #[test]
    fn create2_address_matches_eip1014_vector() {
        // Example 1 from EIP-1014.
        let addr = compute_create2_address_evm(
            Address::ZERO,
            B256::ZERO,
            keccak256(bytes!("00")),
        );
        assert_eq!(addr, address!("4D1A2e2bB4F88F0250f26Ffff098B0b30B26BF38"));
    }

    #[test]
    fn storage_word_to_address() {
        let word = b256!("000000000000000000000000b53127684a568b3173ae13b9f8a6016e243e63b6");
        assert_eq!(
            address_from_word(word),
            address!("b53127684a568b3173ae13b9f8a6016e243e63b6")
        );
    }

    #[test]
    fn structured_files_by_extension() {
        #[derive(serde::Deserialize)]
        struct Sample {
            name: String,
        }
        let json: Sample = parse_structured(Path::new("a.json"), r#"{"name":"x"}"#).unwrap();
        let yaml: Sample = parse_structured(Path::new("a.yaml"), "name: y\n").unwrap();
        assert_eq!(json.name, "x");
        assert_eq!(yaml.name, "y");
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json_atomically(&path, &serde_json::json!({"a": 1})).unwrap();
        write_json_atomically(&path, &serde_json::json!({"a": 2})).unwrap();
        let value: serde_json::Value = read_structured_file(&path).unwrap();
        assert_eq!(value["a"], 2);
        assert!(!path.with_extension("json.tmp").exists());
    }
}

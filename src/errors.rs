use std::path::PathBuf;

use alloy::primitives::{Address, TxHash};

/// Failures that callers need to tell apart. Everything else travels as a plain
/// `anyhow::Error` with context attached.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    #[error(
        "There's upgradability information from previous deployments, it's mandatory to erase it before starting a new one, path: {}",
        .0.display()
    )]
    StaleManifest(PathBuf),
    #[error("Contract artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("No signer configured: set deployerPvtKey, --private-key or --mnemonic")]
    MissingSigner,
    #[error("Deployer contract is not deployed at {0}")]
    DeployerContractMissing(Address),
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    AddressMismatch {
        what: String,
        expected: Address,
        actual: Address,
    },
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    ValueMismatch {
        what: String,
        expected: String,
        actual: String,
    },
    #[error("Transaction {0} reverted")]
    Reverted(TxHash),
    #[error("{what} has not been deployed after {attempts} attempts, last error: {last_error}")]
    AttemptsExhausted {
        what: String,
        attempts: u32,
        last_error: anyhow::Error,
    },
}

/// Fails with [DeployError::AddressMismatch] unless both addresses are equal.
pub fn ensure_address(what: &str, expected: Address, actual: Address) -> Result<(), DeployError> {
    if expected != actual {
        return Err(DeployError::AddressMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

pub fn ensure_value<T: PartialEq + ToString>(
    what: &str,
    expected: T,
    actual: T,
) -> Result<(), DeployError> {
    if expected != actual {
        return Err(DeployError::ValueMismatch {
            what: what.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

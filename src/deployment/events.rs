use std::{fmt, path::PathBuf};

use alloy::primitives::Address;
use colored::Colorize;

/// Progress notifications emitted while the deployment runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// A checkpoint from an interrupted run was found.
    Resuming { path: PathBuf, entries: usize },
    Stage(&'static str),
    /// `fresh == false` means the contract was already on chain.
    Deployed {
        contract: &'static str,
        address: Address,
        fresh: bool,
    },
    /// Taken from the checkpoint and re-validated.
    Reused {
        contract: &'static str,
        address: Address,
    },
    Precomputed {
        contract: &'static str,
        address: Address,
        nonce: u64,
    },
    /// An on-chain value read back for the operator.
    Observed { what: String, value: String },
    AttemptFailed {
        contract: &'static str,
        attempt: u32,
        error: String,
    },
    OwnershipTransferred {
        contract: &'static str,
        new_owner: Address,
    },
    OutputWritten(PathBuf),
}

impl fmt::Display for DeploymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentEvent::Resuming { path, entries } => write!(
                f,
                "Resuming from {} ({entries} contracts already deployed)",
                path.display()
            ),
            DeploymentEvent::Stage(name) => write!(f, "#######################\n{name}"),
            DeploymentEvent::Deployed {
                contract,
                address,
                fresh: true,
            } => write!(f, "{contract} deployed to: {address}"),
            DeploymentEvent::Deployed {
                contract,
                address,
                fresh: false,
            } => write!(f, "{contract} was already deployed to: {address}"),
            DeploymentEvent::Reused { contract, address } => {
                write!(f, "{contract} already deployed on: {address}")
            }
            DeploymentEvent::Precomputed {
                contract,
                address,
                nonce,
            } => write!(f, "Precalculated {contract}: {address} (nonce {nonce})"),
            DeploymentEvent::Observed { what, value } => write!(f, "{what}: {value}"),
            DeploymentEvent::AttemptFailed {
                contract,
                attempt,
                error,
            } => write!(f, "{contract} deployment attempt {attempt} failed: {error}"),
            DeploymentEvent::OwnershipTransferred {
                contract,
                new_owner,
            } => write!(f, "{contract} ownership transferred to: {new_owner}"),
            DeploymentEvent::OutputWritten(path) => {
                write!(f, "Deployment output written to {}", path.display())
            }
        }
    }
}

/// Receives deployment progress. The deployment itself never prints.
pub trait EventSink {
    fn emit(&mut self, event: DeploymentEvent);
}

impl EventSink for Vec<DeploymentEvent> {
    fn emit(&mut self, event: DeploymentEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: DeploymentEvent) {
        (**self).emit(event);
    }
}

/// Prints events for an operator watching the terminal and mirrors them to the log.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl EventSink for ConsoleReporter {
    fn emit(&mut self, event: DeploymentEvent) {
        match &event {
            DeploymentEvent::AttemptFailed { .. } => {
                log::warn!("{event}");
                println!("{}", event.to_string().yellow());
            }
            DeploymentEvent::Stage(_) => {
                log::info!("{event}");
                println!("\n{}", event.to_string().bold());
            }
            DeploymentEvent::Deployed { fresh: true, .. }
            | DeploymentEvent::OutputWritten(_) => {
                log::info!("{event}");
                println!("{}", event.to_string().green());
            }
            _ => {
                log::debug!("{event}");
                println!("{event}");
            }
        }
    }
}

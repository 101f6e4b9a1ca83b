use std::path::{Path, PathBuf};

use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use colored::Colorize;
use deployment::{
    deploy_from_files, events::ConsoleReporter, DeploymentPaths, SequencerConfig,
    DEFAULT_PROXY_ATTEMPTS,
};
use elements::{
    contracts::ContractRegistry,
    manifest::manifest_path,
    output::DeploymentOutput,
    parameters::DeploymentParameters,
    upgrade::UpgradeParameters,
};
use utils::network::{resolve_signer, AlloyChain, GasSettings};
use verifiers::{verify_deployment, VerificationResult};

mod deployment;
mod elements;
mod errors;
mod upgrade;
mod utils;
mod verifiers;

// Upgradability information lives next to the hardhat project.
const MANIFEST_DIR: &str = ".openzeppelin";

#[derive(Debug, Parser)]
#[command(version, about = "Deploys and upgrades the zkEVM bridge contracts")]
struct Args {
    // L1 node the contracts live on.
    #[clap(long, env = "XAGON_RPC_URL", default_value = "http://127.0.0.1:8545", global = true)]
    rpc_url: String,

    // Name of the upgrade manifest inside .openzeppelin/
    #[clap(long, default_value = "hardhat", global = true)]
    network: String,

    // Directory with the compiled hardhat artifacts.
    #[clap(long, default_value = "artifacts", global = true)]
    artifacts: PathBuf,

    #[clap(long, env = "XAGON_DEPLOYER_PRIVATE_KEY", hide_env_values = true, global = true)]
    private_key: Option<String>,

    #[clap(long, env = "MNEMONIC", hide_env_values = true, global = true)]
    mnemonic: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deploys (or resumes deploying) the whole contract set.
    Deploy {
        #[clap(long, default_value = "deployment/deploy_parameters.json")]
        parameters: PathBuf,

        #[clap(long, default_value = "deployment/genesis.json")]
        genesis: PathBuf,

        // Checkpoint of a run that did not finish.
        #[clap(long, default_value = "deployment/deploy_ongoing.json")]
        ongoing: PathBuf,

        #[clap(long, default_value = "deployment/deploy_output.json")]
        output: PathBuf,

        // Tries per upgradable proxy before the run gives up.
        #[clap(
            long,
            default_value_t = DEFAULT_PROXY_ATTEMPTS,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        proxy_attempts: u32,
    },
    /// Deploys new implementations and prints the timelock calls that switch to them.
    Upgrade {
        #[clap(long, default_value = "upgrade/upgrade_parameters.json")]
        parameters: PathBuf,

        #[clap(long, default_value = "upgrade")]
        output_dir: PathBuf,
    },
    /// Checks the bytecode and wiring of a finished deployment.
    Verify {
        #[clap(long, default_value = "deployment/deploy_parameters.json")]
        parameters: PathBuf,

        #[clap(long, default_value = "deployment/deploy_output.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::init();

    let manifest = manifest_path(Path::new(MANIFEST_DIR), &args.network);

    match &args.command {
        Command::Deploy {
            parameters,
            genesis,
            ongoing,
            output,
            proxy_attempts,
        } => {
            let registry = ContractRegistry::load(&args.artifacts)?;
            let result = deploy_from_files(
                |params| {
                    let signer = resolve_signer(
                        &[params.signer.private_key(), args.private_key.as_deref()],
                        args.mnemonic.as_deref(),
                    )?;
                    AlloyChain::connect(&args.rpc_url, signer, params.gas.settings()?)
                },
                &registry,
                parameters,
                genesis,
                DeploymentPaths {
                    checkpoint: ongoing.clone(),
                    output: output.clone(),
                    manifest,
                },
                SequencerConfig {
                    proxy_attempts: *proxy_attempts,
                    ..Default::default()
                },
                ConsoleReporter,
            )
            .await?;

            println!(
                "{} rollup {} at block {}",
                "Deployment finished:".green(),
                result.rollup_address,
                result.deployment_block_number
            );
        }
        Command::Upgrade {
            parameters,
            output_dir,
        } => {
            let params = UpgradeParameters::load(parameters)?;
            let signer = resolve_signer(
                &[params.signer.private_key(), args.private_key.as_deref()],
                args.mnemonic.as_deref(),
            )?;
            let chain = AlloyChain::connect(&args.rpc_url, signer, params.gas.settings()?)?;

            let entries =
                upgrade::prepare_upgrades(&chain, &args.artifacts, &manifest, &params).await?;
            for entry in &entries {
                println!(
                    "{} {} -> {}",
                    entry.contract_name.green(),
                    entry.proxy_address,
                    entry.implementation_address
                );
                println!("  operation id: {}", entry.operation_id);
                println!("  schedule: {}", entry.schedule_data);
                println!("  execute: {}", entry.execute_data);
            }
            let path =
                upgrade::write_upgrade_output(output_dir, chrono::Utc::now().timestamp(), &entries)?;
            println!("Upgrade data written to {}", path.display());
        }
        Command::Verify { parameters, output } => {
            let params = DeploymentParameters::load(parameters)?;
            let output = DeploymentOutput::load(output)?;
            let registry = ContractRegistry::load(&args.artifacts)?;
            // Nothing is sent, any key will do.
            let chain = AlloyChain::connect(
                &args.rpc_url,
                PrivateKeySigner::random(),
                GasSettings::default(),
            )?;

            let mut result = VerificationResult::default();
            verify_deployment(&chain, &registry, &output, &params, &mut result).await?;

            println!("{}", result);
            anyhow::ensure!(
                result.errors == 0,
                "Verification found {} errors",
                result.errors
            );
        }
    }

    Ok(())
}

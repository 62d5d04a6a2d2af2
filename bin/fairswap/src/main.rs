//! fairswap deploys the FairSwap factory and router step by step, recording every address in
//! a registry so a deployment can be split across runs and resumed after a failure.

mod cli;

use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use figment::{
    Figment,
    providers::{Env, Serialized},
};

use cli::{Cli, Command};
use fairswap_deploy::{
    AddressRegistry, ArtifactStore, ChainClient, ChainStepExecutor, DeployConfig,
    ExplorerVerifier, Orchestrator, RpcChainClient, StepOutcome, verify_all,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let overrides = match &cli.command {
        Command::Deploy(args) => cli.overrides.clone().with_deploy_args(args),
        _ => cli.overrides.clone(),
    };

    let config = load_config(&cli, overrides)?;

    match &cli.command {
        Command::Deploy(_) => deploy(config).await,
        Command::Verify { fee_to_setter } => verify(config, *fee_to_setter).await,
        Command::Addresses { network } => addresses(&config, network.as_deref()),
        Command::Init => config.save_to_file(&config_file(&cli)),
    }
}

/// Resolve the effective configuration: defaults, then the TOML file, then `FAIRSWAP_*`
/// environment variables, then command-line flags.
fn load_config(cli: &Cli, overrides: cli::ConfigOverrides) -> Result<DeployConfig> {
    let base = if cli.config.exists() {
        DeployConfig::load_from_file(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "No configuration file, using defaults");
        DeployConfig::default()
    };

    Figment::from(Serialized::defaults(base))
        .merge(
            Env::prefixed("FAIRSWAP_")
                .ignore(&["verbosity", "config"])
                .split("__"),
        )
        .merge(Serialized::defaults(overrides))
        .extract()
        .context("Failed to resolve configuration")
}

fn config_file(cli: &Cli) -> std::path::PathBuf {
    if cli.config.is_dir() {
        cli.config.join(fairswap_deploy::CONFIG_FILENAME)
    } else {
        cli.config.clone()
    }
}

async fn connect(config: &DeployConfig) -> Result<RpcChainClient> {
    let client = RpcChainClient::connect(
        config.rpc_url.clone(),
        config.network_name.clone(),
        config.sender,
    )
    .await
    .context(format!("Failed to connect to {}", config.rpc_url))?;

    Ok(client.with_confirmation_timeout(config.confirmation_timeout_secs.map(Duration::from_secs)))
}

async fn deploy(config: DeployConfig) -> Result<()> {
    let selection = config.selection()?;
    let client = connect(&config).await?;

    let balance = client.balance().await?;
    tracing::info!(
        network = %client.network(),
        sender = %client.sender(),
        balance_wei = %balance,
        "Deploying contracts with account"
    );

    let network = client.network().clone();
    let deployer = client.sender();
    let executor = ChainStepExecutor::new(client, ArtifactStore::new(&config.artifacts_dir));

    let mut orchestrator = Orchestrator::new(
        AddressRegistry::new(&config.registry_path),
        executor,
        network,
        deployer,
    )
    .skip_deployed(config.skip_deployed);

    if let Some(fee_to) = config.fee_to {
        orchestrator = orchestrator.fee_to(fee_to);
    }

    let report = orchestrator.run(&selection).await?;

    let mut table = Table::new();
    table.set_header(vec!["Step", "Outcome", "Address", "Transaction"]);
    for (step, outcome) in &report.steps {
        let row = match outcome {
            StepOutcome::Deployed { contract, address } => vec![
                step.to_string(),
                format!("deployed {contract}"),
                address.to_string(),
                String::new(),
            ],
            StepOutcome::AlreadyDeployed { contract, address } => vec![
                step.to_string(),
                format!("{contract} already deployed"),
                address.to_string(),
                String::new(),
            ],
            StepOutcome::Configured { target, tx_hash } => vec![
                step.to_string(),
                "configured".to_string(),
                target.to_string(),
                tx_hash
                    .map(|hash| hash.to_string())
                    .unwrap_or_else(|| "not needed".to_string()),
            ],
        };
        table.add_row(row);
    }
    println!("{table}");

    Ok(())
}

async fn verify(config: DeployConfig, fee_to_setter: Option<Address>) -> Result<()> {
    let explorer = config
        .explorer
        .clone()
        .context("No block explorer configured; set [explorer] in the configuration file")?;

    let client = connect(&config).await?;
    let network = client.network().clone();
    let registry = AddressRegistry::new(&config.registry_path);
    let verifier = ExplorerVerifier::new(
        explorer,
        network.chain_id,
        ArtifactStore::new(&config.artifacts_dir),
    )?;

    let fee_to_setter = fee_to_setter.unwrap_or_else(|| client.sender());
    let report = verify_all(&verifier, &registry, &network, fee_to_setter).await?;

    tracing::info!(
        network = %network,
        verified = report.verified.len(),
        failed = report.failed.len(),
        "Verification finished"
    );

    if !report.is_success() {
        let failed: Vec<String> = report
            .failed
            .iter()
            .map(|(contract, _)| contract.to_string())
            .collect();
        anyhow::bail!("Verification failed for: {}", failed.join(", "));
    }

    Ok(())
}

fn addresses(config: &DeployConfig, network: Option<&str>) -> Result<()> {
    let registry = AddressRegistry::new(&config.registry_path);

    let networks = match network {
        Some(network) => vec![network.to_string()],
        None => registry.networks()?,
    };

    let mut table = Table::new();
    table.set_header(vec!["Network", "Contract", "Address"]);
    for network in networks {
        for (contract, address) in registry.contracts(&network)? {
            table.add_row(vec![network.clone(), contract, address.to_string()]);
        }
    }

    println!("{table}");

    Ok(())
}

//! Implementations of the orchestrator's commands

use std::path::Path;

use tracing::{info, warn};

use crate::{
    chain::{AlloyClient, ChainClient},
    cli::{DeployArgs, InspectArgs},
    config::DeploymentConfig,
    errors::DeployError,
    manifest::{manifest_file_name, read_manifest, Manifest, SinkOutcome},
    orchestrator::orchestrate,
    topology::{resolve, PlanStep},
};

/// Print the deployment plan of the configuration on `network`
pub fn plan(config_path: &Path, network: &str) -> Result<(), DeployError> {
    let config = DeploymentConfig::load(config_path)?;
    let config = config.for_network(config.network(network)?)?;
    let plan = resolve(&config)?;

    println!("Deployment plan for `{}`:", network);
    for (i, step) in plan.steps.iter().enumerate() {
        match step {
            PlanStep::Deploy { unit, blocking } => {
                let marker = if *blocking { " (blocking)" } else { "" };
                println!("  {:>3}. deploy {}{}", i + 1, unit, marker);
            }
            PlanStep::Derive { call, unblocks } => {
                println!(
                    "  {:>3}. derive {} -> [{}]",
                    i + 1,
                    call,
                    unblocks.join(", ")
                );
            }
        }
    }
    println!("  {} wiring actions", config.wiring.len());

    Ok(())
}

/// Run a full deployment of the configuration to `network`
pub async fn deploy(
    args: DeployArgs,
    config_path: &Path,
    network: &str,
) -> Result<(), DeployError> {
    let config = DeploymentConfig::load(config_path)?;
    let client = AlloyClient::connect(&args.priv_key, &args.rpc_url)?;

    let report = orchestrate(&client, &config, network).await?;

    println!("Deployed {} units to `{}`:", report.manifest.len(), network);
    for (unit, entry) in report.manifest.entries() {
        println!("  {:<24} {}", unit, entry.address);
    }
    for (name, address) in report.state.derived() {
        println!("  {:<24} {:#x} (derived)", name, address);
    }
    println!(
        "Gas committed: {} across {} transactions",
        report.gas_committed, report.transactions
    );
    for sink in &report.sinks {
        match sink {
            SinkOutcome::Written(path) => println!("Manifest written to {}", path.display()),
            SinkOutcome::Skipped(dir) => println!("Skipped missing destination {}", dir.display()),
        }
    }

    Ok(())
}

/// Verify that every unit of a deployments manifest has code deployed
pub async fn inspect(
    args: InspectArgs,
    config_path: &Path,
    network: &str,
) -> Result<(), DeployError> {
    let manifest_path = match args.manifest {
        Some(path) => path,
        None => {
            let config = DeploymentConfig::load(config_path)?;
            let sink = config.destinations.first().ok_or_else(|| {
                DeployError::Configuration(
                    "no manifest given and no destinations configured".to_string(),
                )
            })?;
            sink.dir.join(manifest_file_name(network))
        }
    };

    let manifest = read_manifest(&manifest_path)?;
    let client = AlloyClient::connect_read_only(&args.rpc_url)?;
    info!(
        "inspecting {} units from {}",
        manifest.len(),
        manifest_path.display()
    );

    let missing = verify_code(&client, &manifest).await?;
    if !missing.is_empty() {
        return Err(DeployError::ContractInteraction(format!(
            "no code deployed for [{}]",
            missing.join(", ")
        )));
    }

    println!("All {} units have code deployed", manifest.len());
    Ok(())
}

/// Check each manifest address for deployed code, returning the units that
/// have none
pub async fn verify_code<C: ChainClient>(
    client: &C,
    manifest: &Manifest,
) -> Result<Vec<String>, DeployError> {
    let mut missing = Vec::new();
    for unit in manifest.entries().keys() {
        let address = manifest.address_of(unit)?;
        let code = client.code_at(address).await?;
        if code.is_empty() {
            warn!("`{}` has no code at {:#x}", unit, address);
            missing.push(unit.clone());
        } else {
            println!("  {:<24} {:#x} ({} bytes)", unit, address, code.len());
        }
    }

    Ok(missing)
}

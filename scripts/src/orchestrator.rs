//! The end-to-end deployment procedure
//!
//! The phases run strictly in order: the plan is resolved before any
//! transaction is built, every instantiation is confirmed before wiring
//! begins, and the manifest is only written once wiring has completed. A
//! failure in any phase aborts the run without writing a manifest.

use tracing::info;

use crate::{
    chain::ChainClient,
    config::DeploymentConfig,
    errors::DeployError,
    executor::DeploymentExecutor,
    gas::GasAccumulator,
    manifest::{manifest_file_name, write_manifest, Manifest, SinkOutcome},
    state::DeploymentState,
    topology::{resolve, DeploymentPlan},
    wiring::WiringExecutor,
};

/// The result of a completed deployment
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    /// The plan that was executed
    pub plan: DeploymentPlan,
    /// The manifest of the deployed units
    pub manifest: Manifest,
    /// The final address table, including derived values
    pub state: DeploymentState,
    /// The sum of the declared gas limits of every submitted transaction
    pub gas_committed: u64,
    /// The number of submitted transactions
    pub transactions: usize,
    /// The outcome of writing the manifest to each destination
    pub sinks: Vec<SinkOutcome>,
}

/// Check a configuration against the network it is deployed to, returning
/// the configuration restricted to that network
pub async fn prepare<C: ChainClient>(
    client: &C,
    config: &DeploymentConfig,
    network: &str,
) -> Result<DeploymentConfig, DeployError> {
    let profile = config.network(network)?;

    if let Some(expected) = profile.chain_id {
        let actual = client.chain_id().await?;
        if actual != expected {
            return Err(DeployError::Configuration(format!(
                "network `{}` expects chain id {}, but the endpoint reports {}",
                network, expected, actual
            )));
        }
    }

    if client.deployer().is_zero() {
        return Err(DeployError::Configuration(
            "no deployer account configured".to_string(),
        ));
    }

    config.for_network(profile)
}

/// Deploy, wire, and persist every unit of `config` to `network`
pub async fn orchestrate<C: ChainClient>(
    client: &C,
    config: &DeploymentConfig,
    network: &str,
) -> Result<DeploymentReport, DeployError> {
    let config = prepare(client, config, network).await?;
    let plan = resolve(&config)?;
    info!(
        "deploying {} units to `{}` as {:#x}: {}",
        plan.unit_order().len(),
        network,
        client.deployer(),
        plan
    );

    let mut state = DeploymentState::new(client.deployer());
    let mut gas = GasAccumulator::new();

    // Phase 2: instantiation
    DeploymentExecutor::new(client, &config)
        .execute(&plan, &mut state, &mut gas)
        .await?;

    // Phase 3: wiring
    WiringExecutor::new(client)
        .execute(&config.wiring, &state, &mut gas)
        .await?;

    // Phase 4: manifest
    let manifest = Manifest::from_state(&config, &state)?;
    let sinks = write_manifest(&manifest, &config.destinations, &manifest_file_name(network))?;

    info!(
        units = manifest.len(),
        transactions = gas.transactions(),
        gas_committed = gas.committed(),
        "deployment complete"
    );

    Ok(DeploymentReport {
        plan,
        manifest,
        state,
        gas_committed: gas.committed(),
        transactions: gas.transactions(),
        sinks,
    })
}

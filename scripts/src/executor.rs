//! Instantiation of units in resolved order
//!
//! Each step of the plan is submitted in order. Instantiations whose address
//! a later step consumes are confirmed before the next step is submitted; the
//! others are confirmed as one batch once every step has been submitted.
//! Derived calls are always confirmed and read before continuing.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::{
    chain::{ChainClient, TxRequest},
    config::DeploymentConfig,
    errors::DeployError,
    gas::GasAccumulator,
    state::DeploymentState,
    topology::{DeploymentPlan, PlanStep},
    types::{DeploymentRecord, DerivedCall, UnitClass, UnitDescriptor},
    utils::{decode_address, declared_gas_limit, encode_call, encode_constructor, label_failure},
};

/// Executes the instantiation phase of a deployment
pub struct DeploymentExecutor<'a, C: ChainClient> {
    /// The client transactions are sent through
    client: &'a C,
    /// The units of the configuration, by name
    units: HashMap<&'a str, &'a UnitDescriptor>,
    /// The derived calls of the configuration, by name
    derived: HashMap<&'a str, &'a DerivedCall>,
}

impl<'a, C: ChainClient> DeploymentExecutor<'a, C> {
    /// Create an executor for the units and derived calls of `config`
    pub fn new(client: &'a C, config: &'a DeploymentConfig) -> Self {
        Self {
            client,
            units: config.units.iter().map(|u| (u.name.as_str(), u)).collect(),
            derived: config.derived.iter().map(|d| (d.name.as_str(), d)).collect(),
        }
    }

    /// Execute every step of `plan`, recording results in `state` and
    /// committing declared gas limits to `gas`.
    ///
    /// Returns once every instantiation is confirmed. The first failure aborts
    /// the phase; already confirmed units stay deployed.
    pub async fn execute(
        &self,
        plan: &DeploymentPlan,
        state: &mut DeploymentState,
        gas: &mut GasAccumulator,
    ) -> Result<(), DeployError> {
        let mut deferred = Vec::new();
        for step in &plan.steps {
            match step {
                PlanStep::Deploy { unit, blocking } => {
                    let descriptor = self.unit(unit)?;
                    self.submit_unit(descriptor, state, gas).await?;
                    if *blocking {
                        self.confirm_unit(unit, state).await?;
                    } else {
                        deferred.push(unit.as_str());
                    }
                }
                PlanStep::Derive { call, unblocks } => {
                    let call = self.derived_call(call)?;
                    self.derive(call, state, gas).await?;
                    info!(
                        "derived `{}` unblocks [{}]",
                        call.name,
                        unblocks.join(", ")
                    );
                }
            }
        }

        if !deferred.is_empty() {
            info!("awaiting {} deferred instantiations", deferred.len());
        }
        for unit in deferred {
            self.confirm_unit(unit, state).await?;
        }

        info!(
            units = state.records().len(),
            gas_committed = gas.committed(),
            "all instantiations confirmed"
        );
        Ok(())
    }

    /// Look up a unit named by the plan
    fn unit(&self, name: &str) -> Result<&'a UnitDescriptor, DeployError> {
        self.units.get(name).copied().ok_or_else(|| {
            DeployError::Configuration(format!("plan references unknown unit `{}`", name))
        })
    }

    /// Look up a derived call named by the plan
    fn derived_call(&self, name: &str) -> Result<&'a DerivedCall, DeployError> {
        self.derived.get(name).copied().ok_or_else(|| {
            DeployError::Configuration(format!("plan references unknown derived value `{}`", name))
        })
    }

    /// Resolve a unit's constructor arguments and submit its instantiation
    async fn submit_unit(
        &self,
        unit: &UnitDescriptor,
        state: &mut DeploymentState,
        gas: &mut GasAccumulator,
    ) -> Result<(), DeployError> {
        if unit.class == UnitClass::TestnetOnly {
            warn!(
                "Deploying `{}` - THIS SHOULD ONLY BE DONE FOR TESTING",
                unit.name
            );
        }

        let values = state.resolve_all(&unit.args, &unit.name)?;
        let code = encode_constructor(&unit.artifact, &values, &unit.name)?;
        let tx = TxRequest::create(code);
        let gas_limit = declared_gas_limit(self.client, &tx, unit.gas_limit, &unit.name).await?;

        let tx_hash = self
            .client
            .submit(tx.with_gas_limit(gas_limit))
            .await
            .map_err(|e| label_failure(e, &unit.name))?;
        gas.commit(&unit.name, gas_limit);
        state.record_submission(DeploymentRecord::pending(&unit.name, tx_hash, gas_limit));

        info!(
            unit = %unit.name,
            class = %unit.class,
            tx = %tx_hash,
            gas_limit,
            gas_committed = gas.committed(),
            "submitted instantiation"
        );
        Ok(())
    }

    /// Await a unit's pending instantiation
    async fn confirm_unit(&self, unit: &str, state: &mut DeploymentState) -> Result<(), DeployError> {
        let tx_hash = state
            .pending_tx(unit)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                dependent: unit.to_string(),
                missing: format!("pending instantiation of `{}`", unit),
            })?;

        let outcome = self
            .client
            .await_receipt(tx_hash)
            .await
            .map_err(|e| label_failure(e, unit))?;
        let address = state.finalize(unit, &outcome)?;

        info!("`{}` deployed at {:#x}", unit, address);
        Ok(())
    }

    /// Submit a derived call, await it, and read the value it produced
    async fn derive(
        &self,
        call: &DerivedCall,
        state: &mut DeploymentState,
        gas: &mut GasAccumulator,
    ) -> Result<(), DeployError> {
        let target = state.address_of(&call.target, &call.name)?;

        let values = state.resolve_all(&call.send.args, &call.name)?;
        let input = encode_call(&call.send.signature, &values, &call.name)?;
        let tx = TxRequest::call(target, input);
        let gas_limit = declared_gas_limit(self.client, &tx, call.gas_limit, &call.name).await?;

        let tx_hash = self
            .client
            .submit(tx.with_gas_limit(gas_limit))
            .await
            .map_err(|e| label_failure(e, &call.name))?;
        gas.commit(&call.name, gas_limit);
        info!(
            call = %call.name,
            tx = %tx_hash,
            gas_limit,
            gas_committed = gas.committed(),
            "submitted derived call"
        );

        let outcome = self
            .client
            .await_receipt(tx_hash)
            .await
            .map_err(|e| label_failure(e, &call.name))?;
        if !outcome.success {
            return Err(DeployError::TransactionFailure {
                label: call.name.clone(),
                reason: format!("`{}` reverted", call.send.signature),
            });
        }

        let values = state.resolve_all(&call.read.args, &call.name)?;
        let input = encode_call(&call.read.signature, &values, &call.name)?;
        let output = self.client.call(target, input).await?;
        let address = decode_address(&output, &call.name)?;
        state.set_derived(&call.name, address);

        info!("derived `{}` = {:#x}", call.name, address);
        Ok(())
    }
}

//! Post-deployment wiring of deployed units
//!
//! Wiring actions are scheduled into batches. An action lands in the batch
//! following the last batch holding an action on the same target, or holding
//! any action it is declared `after`. The actions of a batch are submitted
//! back to back and their confirmations awaited together before the next
//! batch is submitted.

use std::collections::HashMap;

use alloy::primitives::TxHash;
use itertools::Itertools;
use tracing::info;

use crate::{
    chain::{ChainClient, TxRequest},
    errors::DeployError,
    gas::GasAccumulator,
    state::DeploymentState,
    types::{WiringAction, WiringKind},
    utils::{
        coerce_address, declared_gas_limit, encode_call, encode_grant_role, label_failure,
    },
};

/// Group wiring actions into batches of mutually independent actions,
/// preserving declaration order within each batch
pub fn schedule(actions: &[WiringAction]) -> Vec<Vec<&WiringAction>> {
    let mut batches: Vec<Vec<&WiringAction>> = Vec::new();
    let mut batch_of_action: HashMap<&str, usize> = HashMap::new();
    let mut last_batch_of_target: HashMap<&str, usize> = HashMap::new();

    for action in actions {
        let after_target = last_batch_of_target
            .get(action.target.as_str())
            .map(|b| b + 1);
        let after_actions = action
            .after
            .iter()
            .filter_map(|name| batch_of_action.get(name.as_str()))
            .map(|b| b + 1)
            .max();
        let batch = after_target.max(after_actions).unwrap_or(0);

        if batch == batches.len() {
            batches.push(Vec::new());
        }
        batches[batch].push(action);
        batch_of_action.insert(action.name.as_str(), batch);
        last_batch_of_target.insert(action.target.as_str(), batch);
    }

    batches
}

/// Executes the wiring phase of a deployment
pub struct WiringExecutor<'a, C: ChainClient> {
    /// The client transactions are sent through
    client: &'a C,
}

impl<'a, C: ChainClient> WiringExecutor<'a, C> {
    /// Create a wiring executor
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Execute every wiring action exactly once, committing declared gas
    /// limits to `gas`.
    ///
    /// Refuses to start while any deployment record is unconfirmed. The first
    /// failure aborts the phase.
    pub async fn execute(
        &self,
        actions: &[WiringAction],
        state: &DeploymentState,
        gas: &mut GasAccumulator,
    ) -> Result<usize, DeployError> {
        if let Some(unit) = state.unconfirmed().first() {
            return Err(DeployError::UnresolvedDependency {
                dependent: "wiring".to_string(),
                missing: unit.to_string(),
            });
        }

        let batches = schedule(actions);
        for (i, batch) in batches.iter().enumerate() {
            info!(
                "wiring batch {}/{}: {}",
                i + 1,
                batches.len(),
                batch.iter().map(|a| a.name.as_str()).join(", ")
            );

            let mut submitted: Vec<(&str, TxHash)> = Vec::with_capacity(batch.len());
            for action in batch {
                let tx_hash = self.submit(action, state, gas).await?;
                submitted.push((action.name.as_str(), tx_hash));
            }

            for (name, tx_hash) in submitted {
                let outcome = self
                    .client
                    .await_receipt(tx_hash)
                    .await
                    .map_err(|e| label_failure(e, name))?;
                if !outcome.success {
                    return Err(DeployError::TransactionFailure {
                        label: name.to_string(),
                        reason: format!("wiring transaction {:#x} reverted", tx_hash),
                    });
                }
                info!("wired `{}`", name);
            }
        }

        info!(
            actions = actions.len(),
            batches = batches.len(),
            gas_committed = gas.committed(),
            "wiring complete"
        );
        Ok(actions.len())
    }

    /// Encode and submit a single wiring action
    async fn submit(
        &self,
        action: &WiringAction,
        state: &DeploymentState,
        gas: &mut GasAccumulator,
    ) -> Result<TxHash, DeployError> {
        let target = state.address_of(&action.target, &action.name)?;
        let input = match &action.kind {
            WiringKind::Register(call) => {
                let values = state.resolve_all(&call.args, &action.name)?;
                encode_call(&call.signature, &values, &action.name)?
            }
            WiringKind::Grant {
                role,
                role_id,
                grantee,
            } => {
                let account = state.resolve(grantee, &action.name)?;
                let context = format!("{} grantee of {}", action.name, role);
                encode_grant_role(*role_id, coerce_address(&account, &context)?)
            }
        };

        let tx = TxRequest::call(target, input);
        let gas_limit = declared_gas_limit(self.client, &tx, action.gas_limit, &action.name).await?;
        let tx_hash = self
            .client
            .submit(tx.with_gas_limit(gas_limit))
            .await
            .map_err(|e| label_failure(e, &action.name))?;
        gas.commit(&action.name, gas_limit);

        info!(
            action = %action.name,
            tx = %tx_hash,
            gas_limit,
            gas_committed = gas.committed(),
            "submitted wiring action"
        );
        Ok(tx_hash)
    }
}

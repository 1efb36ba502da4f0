//! The in-memory address table of a deployment run

use std::collections::BTreeMap;

use alloy::primitives::{Address, TxHash};
use serde_json::Value;

use crate::{
    chain::TxOutcome,
    errors::DeployError,
    types::{Argument, DeploymentRecord, DeploymentStatus},
};

/// The deployment records and derived values observed so far.
///
/// Addresses are only handed out for confirmed records, so any argument
/// resolved through the table refers to a unit whose instantiation has been
/// observed on-chain.
#[derive(Debug, Clone)]
pub struct DeploymentState {
    /// The address of the deploying account
    deployer: Address,
    /// The deployment records, keyed by unit name
    records: BTreeMap<String, DeploymentRecord>,
    /// The values produced by derived calls, keyed by call name
    derived: BTreeMap<String, Address>,
}

impl DeploymentState {
    /// Create an empty table for the given deployer
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            records: BTreeMap::new(),
            derived: BTreeMap::new(),
        }
    }

    /// The address of the deploying account
    pub fn deployer(&self) -> Address {
        self.deployer
    }

    /// Record a submitted instantiation
    pub fn record_submission(&mut self, record: DeploymentRecord) {
        self.records.insert(record.unit.clone(), record);
    }

    /// The transaction hash of a unit's pending instantiation
    pub fn pending_tx(&self, unit: &str) -> Option<TxHash> {
        self.records
            .get(unit)
            .filter(|record| record.status == DeploymentStatus::Pending)
            .map(|record| record.tx_hash)
    }

    /// Finalize a unit's record from its transaction outcome, returning the
    /// confirmed address
    pub fn finalize(&mut self, unit: &str, outcome: &TxOutcome) -> Result<Address, DeployError> {
        let record = self.records.get_mut(unit).ok_or_else(|| {
            DeployError::UnresolvedDependency {
                dependent: unit.to_string(),
                missing: format!("submitted instantiation of `{}`", unit),
            }
        })?;

        let address = match (outcome.success, outcome.contract_address) {
            (true, Some(address)) => address,
            (success, _) => {
                let reason = if success {
                    "receipt contains no contract address".to_string()
                } else {
                    format!("instantiation {:#x} reverted", record.tx_hash)
                };
                record.status = DeploymentStatus::Failed {
                    reason: reason.clone(),
                };
                return Err(DeployError::TransactionFailure {
                    label: unit.to_string(),
                    reason,
                });
            }
        };

        record.status = DeploymentStatus::Confirmed {
            address,
            block: outcome.block_number,
            gas_used: outcome.gas_used,
        };
        Ok(address)
    }

    /// The record of a unit
    pub fn record(&self, unit: &str) -> Option<&DeploymentRecord> {
        self.records.get(unit)
    }

    /// All records, keyed by unit name
    pub fn records(&self) -> &BTreeMap<String, DeploymentRecord> {
        &self.records
    }

    /// The names of units whose records are not confirmed
    pub fn unconfirmed(&self) -> Vec<&str> {
        self.records
            .values()
            .filter(|record| !record.is_confirmed())
            .map(|record| record.unit.as_str())
            .collect()
    }

    /// Store the value produced by a derived call
    pub fn set_derived(&mut self, name: &str, address: Address) {
        self.derived.insert(name.to_string(), address);
    }

    /// The values produced by derived calls
    pub fn derived(&self) -> &BTreeMap<String, Address> {
        &self.derived
    }

    /// The confirmed address of a unit, needed by `dependent`
    pub fn address_of(&self, unit: &str, dependent: &str) -> Result<Address, DeployError> {
        self.records
            .get(unit)
            .and_then(DeploymentRecord::address)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                dependent: dependent.to_string(),
                missing: unit.to_string(),
            })
    }

    /// Resolve an argument needed by `dependent` to the JSON value coerced
    /// against its ABI type. Addresses resolve to their string form.
    pub fn resolve(&self, arg: &Argument, dependent: &str) -> Result<Value, DeployError> {
        let address = |a: Address| Value::String(a.to_string());
        match arg {
            Argument::Literal(value) => Ok(value.clone()),
            Argument::Deployer => Ok(address(self.deployer)),
            Argument::Unit(unit) => self.address_of(unit, dependent).map(address),
            Argument::Derived(name) => self
                .derived
                .get(name)
                .copied()
                .map(address)
                .ok_or_else(|| DeployError::UnresolvedDependency {
                    dependent: dependent.to_string(),
                    missing: format!("derived:{}", name),
                }),
        }
    }

    /// Resolve every argument needed by `dependent`
    pub fn resolve_all(
        &self,
        args: &[Argument],
        dependent: &str,
    ) -> Result<Vec<Value>, DeployError> {
        args.iter().map(|arg| self.resolve(arg, dependent)).collect()
    }
}

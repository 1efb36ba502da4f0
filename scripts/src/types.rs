//! Type definitions used throughout the deployment phases

use std::fmt::{self, Display};

use alloy::primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifacts::Artifact;

// ---------
// | Units |
// ---------

/// The classification of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UnitClass {
    /// A core protocol contract
    #[default]
    Core,
    /// A contract specific to one liquidity pool
    Pool,
    /// An auction contract
    Auction,
    /// A contract of the reward system
    RewardSystem,
    /// A contract deployed only on test networks
    TestnetOnly,
}

impl Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitClass::Core => write!(f, "core"),
            UnitClass::Pool => write!(f, "pool"),
            UnitClass::Auction => write!(f, "auction"),
            UnitClass::RewardSystem => write!(f, "reward-system"),
            UnitClass::TestnetOnly => write!(f, "testnet-only"),
        }
    }
}

/// A resolved argument to a constructor, a derived call, or a wiring action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A literal JSON value, coerced against the ABI type of its parameter
    Literal(Value),
    /// The address of another unit
    Unit(String),
    /// The value produced by a derived call
    Derived(String),
    /// The address of the deploying account
    Deployer,
}

impl Argument {
    /// The dependency this argument introduces, if any
    pub fn dependency(&self) -> Option<Dependency<'_>> {
        match self {
            Argument::Unit(name) => Some(Dependency::Unit(name)),
            Argument::Derived(name) => Some(Dependency::Derived(name)),
            Argument::Literal(_) | Argument::Deployer => None,
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Literal(Value::String(s)) => write!(f, "{}", s),
            Argument::Literal(value) => write!(f, "{}", value),
            Argument::Unit(name) => write!(f, "{}", name),
            Argument::Derived(name) => write!(f, "derived:{}", name),
            Argument::Deployer => write!(f, "deployer"),
        }
    }
}

/// A reference from one node of the deployment graph to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency<'a> {
    /// The address of a deployed unit
    Unit(&'a str),
    /// The value produced by a derived call
    Derived(&'a str),
}

impl Display for Dependency<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Unit(name) => write!(f, "{}", name),
            Dependency::Derived(name) => write!(f, "derived:{}", name),
        }
    }
}

/// A named on-chain component to be deployed
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    /// The logical name of the unit, unique within a configuration
    pub name: String,
    /// The classification of the unit
    pub class: UnitClass,
    /// The compiled artifact to instantiate
    pub artifact: Artifact,
    /// The constructor arguments, in ABI order
    pub args: Vec<Argument>,
    /// A declared gas limit, overriding the estimate
    pub gas_limit: Option<u64>,
}

impl UnitDescriptor {
    /// Create a core unit with no constructor arguments
    pub fn new(name: impl Into<String>, artifact: Artifact) -> Self {
        Self {
            name: name.into(),
            class: UnitClass::Core,
            artifact,
            args: Vec::new(),
            gas_limit: None,
        }
    }

    /// Append a constructor argument
    pub fn with_arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    /// Set the classification
    pub fn with_class(mut self, class: UnitClass) -> Self {
        self.class = class;
        self
    }

    /// Set a declared gas limit
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// The construction-time dependencies of the unit
    pub fn dependencies(&self) -> impl Iterator<Item = Dependency<'_>> {
        self.args.iter().filter_map(Argument::dependency)
    }
}

/// A contract call given by its human-readable signature,
/// e.g. `createPair(address,address)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// The function signature
    pub signature: String,
    /// The call arguments, in ABI order
    pub args: Vec<Argument>,
}

/// A value produced by a side-effecting call on a deployed unit.
///
/// The `send` call is submitted as a transaction and confirmed, after which
/// the `read` call is evaluated to obtain the produced address.
#[derive(Debug, Clone)]
pub struct DerivedCall {
    /// The name under which the produced value is referenced
    pub name: String,
    /// The unit the calls are made on
    pub target: String,
    /// The side-effecting call producing the value
    pub send: CallSpec,
    /// The read-only call returning the produced address
    pub read: CallSpec,
    /// A declared gas limit for the `send` transaction
    pub gas_limit: Option<u64>,
}

impl DerivedCall {
    /// The dependencies of the call: its target unit and every reference in
    /// either call's arguments
    pub fn dependencies(&self) -> impl Iterator<Item = Dependency<'_>> {
        std::iter::once(Dependency::Unit(self.target.as_str())).chain(
            self.send
                .args
                .iter()
                .chain(self.read.args.iter())
                .filter_map(Argument::dependency),
        )
    }
}

// ----------
// | Wiring |
// ----------

/// The operation performed by a wiring action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringKind {
    /// Supply the target with the addresses of its peers
    Register(CallSpec),
    /// Grant an AccessControl role on the target to the grantee
    Grant {
        /// The role name, as declared
        role: String,
        /// The role id passed to `grantRole`
        role_id: B256,
        /// The account receiving the role
        grantee: Argument,
    },
}

/// A post-deployment call on a deployed unit
#[derive(Debug, Clone)]
pub struct WiringAction {
    /// The unique name of the action
    pub name: String,
    /// The unit the call is made on
    pub target: String,
    /// The operation performed
    pub kind: WiringKind,
    /// Names of earlier actions this action must be sequenced behind
    pub after: Vec<String>,
    /// A declared gas limit, overriding the estimate
    pub gas_limit: Option<u64>,
}

impl WiringAction {
    /// Every unit or derived value the action references, including its target
    pub fn references(&self) -> impl Iterator<Item = Dependency<'_>> {
        let args: &[Argument] = match &self.kind {
            WiringKind::Register(call) => &call.args,
            WiringKind::Grant { grantee, .. } => std::slice::from_ref(grantee),
        };

        std::iter::once(Dependency::Unit(self.target.as_str()))
            .chain(args.iter().filter_map(Argument::dependency))
    }
}

// ----------------------
// | Deployment Records |
// ----------------------

/// The confirmation status of a submitted instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentStatus {
    /// Submitted, not yet confirmed
    Pending,
    /// Confirmed on-chain
    Confirmed {
        /// The address of the instantiated unit
        address: Address,
        /// The block the transaction was included in
        block: Option<u64>,
        /// The gas consumed by the transaction
        gas_used: u64,
    },
    /// Reverted, or confirmed without producing a contract
    Failed {
        /// The failure reason
        reason: String,
    },
}

/// The record of a unit's instantiation transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// The logical name of the unit
    pub unit: String,
    /// The hash of the instantiation transaction
    pub tx_hash: TxHash,
    /// The gas limit declared at submission
    pub gas_limit: u64,
    /// The confirmation status
    pub status: DeploymentStatus,
}

impl DeploymentRecord {
    /// Create a pending record for a submitted transaction
    pub fn pending(unit: impl Into<String>, tx_hash: TxHash, gas_limit: u64) -> Self {
        Self {
            unit: unit.into(),
            tx_hash,
            gas_limit,
            status: DeploymentStatus::Pending,
        }
    }

    /// The address of the unit, only available once confirmed
    pub fn address(&self) -> Option<Address> {
        match self.status {
            DeploymentStatus::Confirmed { address, .. } => Some(address),
            _ => None,
        }
    }

    /// Whether the record is confirmed
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, DeploymentStatus::Confirmed { .. })
    }
}

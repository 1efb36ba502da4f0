//! Definitions of errors that can occur during a deployment run

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use itertools::Itertools;

/// Errors that can occur while planning, executing, or persisting a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// A required input is missing or malformed.
    ///
    /// Always raised before any transaction is submitted.
    Configuration(String),
    /// The unit dependency graph contains a cycle, listed in traversal order
    /// with the first node repeated at the end
    CyclicDependency(Vec<String>),
    /// An argument referenced a deployment record or derived value that was
    /// not available when it was needed.
    ///
    /// The resolver orders every dependency ahead of its dependents, so this
    /// indicates an internal ordering bug rather than a user error.
    UnresolvedDependency {
        /// The unit, derived call, or wiring action being executed
        dependent: String,
        /// The reference that could not be resolved
        missing: String,
    },
    /// A transaction reverted or could not be confirmed
    TransactionFailure {
        /// The unit, derived call, or wiring action the transaction belongs to
        label: String,
        /// The reason reported by the client
        reason: String,
    },
    /// Error parsing a compilation artifact
    ArtifactParsing(String),
    /// Error constructing calldata for a constructor or contract method
    CalldataConstruction(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error reading from a deployed contract
    ContractInteraction(String),
    /// Error reading or writing a deployments manifest
    ManifestWrite(String),
}

impl DeployError {
    /// Whether the error was raised before any transaction could be submitted
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            DeployError::Configuration(_)
                | DeployError::CyclicDependency(_)
                | DeployError::ArtifactParsing(_)
        )
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Configuration(s) => write!(f, "configuration error: {}", s),
            DeployError::CyclicDependency(cycle) => {
                write!(f, "cyclic dependency: {}", cycle.iter().join(" -> "))
            }
            DeployError::UnresolvedDependency { dependent, missing } => write!(
                f,
                "unresolved dependency: `{}` requires `{}` which is not yet available",
                dependent, missing
            ),
            DeployError::TransactionFailure { label, reason } => {
                write!(f, "transaction for `{}` failed: {}", label, reason)
            }
            DeployError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            DeployError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            DeployError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            DeployError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            DeployError::ManifestWrite(s) => write!(f, "manifest error: {}", s),
        }
    }
}

impl Error for DeployError {}

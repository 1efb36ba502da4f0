//! Loading and validation of the deployment configuration
//!
//! The configuration is a JSON file declaring the units to deploy, the
//! derived calls that produce values consumed by later units, the wiring
//! actions and role grants issued after deployment, the manifest destinations,
//! and the networks the configuration may be deployed to. Every reference is
//! validated here, before any transaction is built.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::primitives::{keccak256, B256};
use itertools::Itertools;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    artifacts::Artifact,
    constants::DEFAULT_ADMIN_ROLE,
    errors::DeployError,
    manifest::ManifestSink,
    types::{
        Argument, CallSpec, Dependency, DerivedCall, UnitClass, UnitDescriptor, WiringAction,
        WiringKind,
    },
};

// ----------------
// | File Formats |
// ----------------

/// The on-disk shape of the configuration file
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    /// The directory artifact paths are relative to, itself relative to the
    /// configuration file
    #[serde(default)]
    artifacts_dir: Option<PathBuf>,
    /// The units to deploy
    units: Vec<UnitEntry>,
    /// The derived calls
    #[serde(default)]
    derived: Vec<DerivedEntry>,
    /// The registration calls issued after deployment
    #[serde(default)]
    wiring: Vec<WiringEntry>,
    /// The role grants issued after deployment
    #[serde(default)]
    grants: Vec<GrantEntry>,
    /// The manifest destinations
    #[serde(default)]
    destinations: Vec<DestinationEntry>,
    /// The networks this configuration may be deployed to
    #[serde(default)]
    networks: BTreeMap<String, NetworkProfile>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitEntry {
    name: String,
    artifact: PathBuf,
    #[serde(default)]
    class: UnitClass,
    #[serde(default)]
    args: Vec<ArgEntry>,
    #[serde(default)]
    gas_limit: Option<u64>,
}

/// An argument as written in the configuration file
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ArgEntry {
    Literal(Value),
    Env(String),
    Unit(String),
    Derived(String),
    Deployer,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CallEntry {
    signature: String,
    #[serde(default)]
    args: Vec<ArgEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DerivedEntry {
    name: String,
    target: String,
    send: CallEntry,
    read: CallEntry,
    #[serde(default)]
    gas_limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WiringEntry {
    #[serde(default)]
    name: Option<String>,
    target: String,
    signature: String,
    #[serde(default)]
    args: Vec<ArgEntry>,
    #[serde(default)]
    after: Vec<String>,
    #[serde(default)]
    gas_limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GrantEntry {
    #[serde(default)]
    name: Option<String>,
    target: String,
    role: String,
    grantee: ArgEntry,
    #[serde(default)]
    after: Vec<String>,
    #[serde(default)]
    gas_limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DestinationEntry {
    path: PathBuf,
    #[serde(default)]
    required: bool,
}

/// The properties of a network a configuration may be deployed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkProfile {
    /// Whether testnet-only units are deployed to this network
    #[serde(default)]
    pub testnet: bool,
    /// The chain id the connected RPC endpoint must report
    #[serde(default)]
    pub chain_id: Option<u64>,
}

// -----------------
// | Configuration |
// -----------------

/// A validated deployment configuration
#[derive(Debug, Clone, Default)]
pub struct DeploymentConfig {
    /// The units to deploy, in declaration order
    pub units: Vec<UnitDescriptor>,
    /// The derived calls, in declaration order
    pub derived: Vec<DerivedCall>,
    /// The wiring actions, registrations first, then grants
    pub wiring: Vec<WiringAction>,
    /// The manifest destinations
    pub destinations: Vec<ManifestSink>,
    /// The networks this configuration may be deployed to
    pub networks: BTreeMap<String, NetworkProfile>,
}

impl DeploymentConfig {
    /// Load the configuration at `path`, resolving `env` arguments against
    /// the process environment
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load the configuration at `path`, resolving `env` arguments with `env`
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DeployError::Configuration(format!(
                "failed to read configuration at {}: {}",
                path.display(),
                e
            ))
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));

        Self::from_json_str(&contents, base_dir, env)
    }

    /// Parse and validate a configuration, resolving relative paths against
    /// `base_dir`
    pub fn from_json_str(
        contents: &str,
        base_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeployError> {
        let file: ConfigFile =
            serde_json::from_str(contents).map_err(|e| DeployError::Configuration(e.to_string()))?;

        let artifacts_dir = match &file.artifacts_dir {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };

        let resolver = ArgResolver { env: &env };
        let mut artifact_cache: HashMap<PathBuf, Artifact> = HashMap::new();

        let mut units = Vec::with_capacity(file.units.len());
        for entry in file.units {
            let artifact_path = artifacts_dir.join(&entry.artifact);
            let artifact = match artifact_cache.get(&artifact_path) {
                Some(artifact) => artifact.clone(),
                None => {
                    let artifact = Artifact::load(&artifact_path)?;
                    artifact_cache.insert(artifact_path, artifact.clone());
                    artifact
                }
            };

            units.push(UnitDescriptor {
                args: resolver.resolve_all(&entry.args, &entry.name)?,
                name: entry.name,
                class: entry.class,
                artifact,
                gas_limit: entry.gas_limit,
            });
        }

        let derived = file
            .derived
            .into_iter()
            .map(|entry| {
                Ok(DerivedCall {
                    send: resolver.resolve_call(entry.send, &entry.name)?,
                    read: resolver.resolve_call(entry.read, &entry.name)?,
                    name: entry.name,
                    target: entry.target,
                    gas_limit: entry.gas_limit,
                })
            })
            .collect::<Result<Vec<_>, DeployError>>()?;

        let mut wiring = Vec::with_capacity(file.wiring.len() + file.grants.len());
        let mut default_names: HashMap<String, usize> = HashMap::new();
        for entry in file.wiring {
            let name = match entry.name {
                Some(name) => name,
                None => {
                    // Repeated calls of one function on a target are numbered
                    // from the second on: `Pool.addPeer`, `Pool.addPeer#2`
                    let function = entry.signature.split('(').next().unwrap_or_default();
                    let base = format!("{}.{}", entry.target, function);
                    let count = default_names.entry(base.clone()).or_insert(0);
                    *count += 1;
                    match *count {
                        1 => base,
                        n => format!("{}#{}", base, n),
                    }
                }
            };
            let call = CallSpec {
                args: resolver.resolve_all(&entry.args, &name)?,
                signature: entry.signature,
            };

            wiring.push(WiringAction {
                name,
                target: entry.target,
                kind: WiringKind::Register(call),
                after: entry.after,
                gas_limit: entry.gas_limit,
            });
        }
        for entry in file.grants {
            let grantee = resolver.resolve(&entry.grantee, &entry.target)?;
            let name = entry.name.unwrap_or_else(|| {
                format!("{}.grantRole({}, {})", entry.target, entry.role, grantee)
            });

            wiring.push(WiringAction {
                name,
                target: entry.target,
                kind: WiringKind::Grant {
                    role_id: role_id(&entry.role)?,
                    role: entry.role,
                    grantee,
                },
                after: entry.after,
                gas_limit: entry.gas_limit,
            });
        }

        let destinations = file
            .destinations
            .into_iter()
            .map(|entry| ManifestSink {
                dir: base_dir.join(entry.path),
                required: entry.required,
            })
            .collect();

        let config = Self {
            units,
            derived,
            wiring,
            destinations,
            networks: file.networks,
        };
        config.validate()?;

        Ok(config)
    }

    /// Look up the profile of a declared network
    pub fn network(&self, name: &str) -> Result<NetworkProfile, DeployError> {
        self.networks.get(name).copied().ok_or_else(|| {
            DeployError::Configuration(format!(
                "network `{}` is not declared; known networks: [{}]",
                name,
                self.networks.keys().join(", ")
            ))
        })
    }

    /// Restrict the configuration to what is deployed on the given network.
    ///
    /// On non-testnet networks, testnet-only units are removed together with
    /// the derived calls and wiring actions targeting them. Any remaining
    /// reference to a removed unit is a configuration error.
    pub fn for_network(&self, profile: NetworkProfile) -> Result<Self, DeployError> {
        if profile.testnet {
            return Ok(self.clone());
        }

        let excluded: HashSet<&str> = self
            .units
            .iter()
            .filter(|unit| unit.class == UnitClass::TestnetOnly)
            .map(|unit| unit.name.as_str())
            .collect();
        if excluded.is_empty() {
            return Ok(self.clone());
        }
        info!(
            "excluding testnet-only units: {}",
            excluded.iter().sorted().join(", ")
        );

        let units = self
            .units
            .iter()
            .filter(|unit| !excluded.contains(unit.name.as_str()))
            .cloned()
            .collect();
        let derived = self
            .derived
            .iter()
            .filter(|call| !excluded.contains(call.target.as_str()))
            .cloned()
            .collect();
        let (wiring, dropped): (Vec<&WiringAction>, Vec<&WiringAction>) = self
            .wiring
            .iter()
            .partition(|action| !excluded.contains(action.target.as_str()));
        let dropped: HashSet<&str> = dropped.iter().map(|a| a.name.as_str()).collect();
        let wiring = wiring
            .into_iter()
            .map(|action| {
                let mut action = action.clone();
                action.after.retain(|name| !dropped.contains(name.as_str()));
                action
            })
            .collect();

        let config = Self {
            units,
            derived,
            wiring,
            destinations: self.destinations.clone(),
            networks: self.networks.clone(),
        };
        config.validate().map_err(|e| match e {
            DeployError::Configuration(msg) => DeployError::Configuration(format!(
                "{} (after excluding testnet-only units)",
                msg
            )),
            other => other,
        })?;

        Ok(config)
    }

    /// Check that names are unique and every reference resolves
    pub fn validate(&self) -> Result<(), DeployError> {
        let unit_names = unique_names(self.units.iter().map(|u| u.name.as_str()), "unit")?;
        let derived_names = unique_names(self.derived.iter().map(|d| d.name.as_str()), "derived")?;
        unique_names(self.wiring.iter().map(|a| a.name.as_str()), "wiring action")?;

        let check = |owner: &str, dep: Dependency<'_>| match dep {
            Dependency::Unit(name) if !unit_names.contains(name) => Err(
                DeployError::Configuration(format!("`{}` references unknown unit `{}`", owner, name)),
            ),
            Dependency::Derived(name) if !derived_names.contains(name) => {
                Err(DeployError::Configuration(format!(
                    "`{}` references unknown derived value `{}`",
                    owner, name
                )))
            }
            _ => Ok(()),
        };

        for unit in &self.units {
            unit.dependencies().try_for_each(|dep| check(&unit.name, dep))?;
        }
        for call in &self.derived {
            call.dependencies().try_for_each(|dep| check(&call.name, dep))?;
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for action in &self.wiring {
            action.references().try_for_each(|dep| check(&action.name, dep))?;
            if let Some(missing) = action.after.iter().find(|a| !earlier.contains(a.as_str())) {
                return Err(DeployError::Configuration(format!(
                    "wiring action `{}` is sequenced after `{}`, which is not declared before it",
                    action.name, missing
                )));
            }
            earlier.insert(action.name.as_str());
        }

        if self.destinations.is_empty() {
            warn!("no manifest destinations configured, the manifest will not be persisted");
        }

        Ok(())
    }
}

// -----------
// | Helpers |
// -----------

/// Resolves configuration arguments, substituting environment values
struct ArgResolver<'a, F: Fn(&str) -> Option<String>> {
    /// The environment lookup
    env: &'a F,
}

impl<F: Fn(&str) -> Option<String>> ArgResolver<'_, F> {
    /// Resolve a single argument declared by `owner`
    fn resolve(&self, entry: &ArgEntry, owner: &str) -> Result<Argument, DeployError> {
        match entry {
            ArgEntry::Literal(value) => {
                check_literal(value)?;
                Ok(Argument::Literal(value.clone()))
            }
            ArgEntry::Env(key) => (self.env)(key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| Argument::Literal(Value::String(value)))
                .ok_or_else(|| {
                    DeployError::Configuration(format!(
                        "`{}` requires environment variable `{}`, which is not set",
                        owner, key
                    ))
                }),
            ArgEntry::Unit(name) => Ok(Argument::Unit(name.clone())),
            ArgEntry::Derived(name) => Ok(Argument::Derived(name.clone())),
            ArgEntry::Deployer => Ok(Argument::Deployer),
        }
    }

    /// Resolve an argument list declared by `owner`
    fn resolve_all(&self, entries: &[ArgEntry], owner: &str) -> Result<Vec<Argument>, DeployError> {
        entries.iter().map(|e| self.resolve(e, owner)).collect()
    }

    /// Resolve a call declared by `owner`
    fn resolve_call(&self, entry: CallEntry, owner: &str) -> Result<CallSpec, DeployError> {
        Ok(CallSpec {
            args: self.resolve_all(&entry.args, owner)?,
            signature: entry.signature,
        })
    }
}

/// Check that a JSON literal has an ABI counterpart: strings, numbers, and
/// booleans, nested in arrays for array and tuple parameters
fn check_literal(value: &Value) -> Result<(), DeployError> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        Value::Array(items) => items.iter().try_for_each(check_literal),
        Value::Null | Value::Object(_) => Err(DeployError::Configuration(format!(
            "unsupported literal argument: {}",
            value
        ))),
    }
}

/// Compute the AccessControl id of a role.
///
/// `DEFAULT_ADMIN_ROLE` is the zero word, a 32-byte hex string is taken as
/// the id itself, and any other name is hashed with keccak256.
pub fn role_id(role: &str) -> Result<B256, DeployError> {
    if role == DEFAULT_ADMIN_ROLE {
        Ok(B256::ZERO)
    } else if role.starts_with("0x") {
        B256::from_str(role)
            .map_err(|e| DeployError::Configuration(format!("invalid role id `{}`: {}", role, e)))
    } else {
        Ok(keccak256(role.as_bytes()))
    }
}

/// Collect names into a set, failing on duplicates
fn unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
    kind: &str,
) -> Result<HashSet<&'a str>, DeployError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(DeployError::Configuration(format!(
                "duplicate {} name `{}`",
                kind, name
            )));
        }
    }

    Ok(seen)
}

//! The deployments manifest: the persisted address and interface table of a
//! completed deployment

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::{
    config::DeploymentConfig,
    constants::{MANIFEST_FILE_EXTENSION, MANIFEST_FILE_PREFIX},
    errors::DeployError,
    state::DeploymentState,
};

/// The manifest entry of a single unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The checksummed address of the unit
    pub address: String,
    /// The unit's interface descriptor (its ABI)
    pub artifacts: Value,
}

/// A mapping from logical unit name to its address and interface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    /// The entries, keyed by unit name
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Build the manifest of a completed deployment.
    ///
    /// Every unit of the configuration must have a confirmed record; the
    /// manifest only carries addresses observed from confirmed records.
    pub fn from_state(
        config: &DeploymentConfig,
        state: &DeploymentState,
    ) -> Result<Self, DeployError> {
        let entries = config
            .units
            .iter()
            .map(|unit| {
                let address = state.address_of(&unit.name, "manifest")?;
                let entry = ManifestEntry {
                    address: address.to_string(),
                    artifacts: unit.artifact.abi_json.clone(),
                };
                Ok((unit.name.clone(), entry))
            })
            .collect::<Result<_, DeployError>>()?;

        Ok(Self { entries })
    }

    /// The entries, keyed by unit name
    pub fn entries(&self) -> &BTreeMap<String, ManifestEntry> {
        &self.entries
    }

    /// The number of units in the manifest
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The address of a unit
    pub fn address_of(&self, unit: &str) -> Result<Address, DeployError> {
        let entry = self.entries.get(unit).ok_or_else(|| {
            DeployError::ManifestWrite(format!("unit `{}` not found in manifest", unit))
        })?;

        Address::from_str(&entry.address).map_err(|e| {
            DeployError::ManifestWrite(format!(
                "invalid address `{}` for `{}`: {}",
                entry.address, unit, e
            ))
        })
    }

    /// Serialize the manifest as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, DeployError> {
        serde_json::to_string_pretty(self).map_err(|e| DeployError::ManifestWrite(e.to_string()))
    }
}

// ---------
// | Sinks |
// ---------

/// A directory the manifest is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSink {
    /// The destination directory
    pub dir: PathBuf,
    /// Whether the directory is created when missing. Optional sinks model
    /// downstream projects that may not be checked out, and are skipped when
    /// their directory does not exist.
    pub required: bool,
}

/// The result of writing the manifest to one sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The manifest was written to the given file
    Written(PathBuf),
    /// The sink's directory does not exist, nothing was written
    Skipped(PathBuf),
}

/// The manifest file name for a network, `deployments.<network>.json`
pub fn manifest_file_name(network: &str) -> String {
    format!(
        "{}.{}.{}",
        MANIFEST_FILE_PREFIX, network, MANIFEST_FILE_EXTENSION
    )
}

/// Write the manifest to every sink.
///
/// Each sink is attempted independently and each write is an atomic replace.
/// If any write fails the remaining sinks are still attempted, and the first
/// failure is returned.
pub fn write_manifest(
    manifest: &Manifest,
    sinks: &[ManifestSink],
    file_name: &str,
) -> Result<Vec<SinkOutcome>, DeployError> {
    let contents = manifest.to_json_pretty()?;

    let mut outcomes = Vec::with_capacity(sinks.len());
    let mut first_error = None;
    for sink in sinks {
        match write_to_sink(sink, file_name, contents.as_bytes()) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!("failed writing manifest to {}: {}", sink.dir.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

/// Write the manifest contents to a single sink
fn write_to_sink(
    sink: &ManifestSink,
    file_name: &str,
    contents: &[u8],
) -> Result<SinkOutcome, DeployError> {
    if !sink.dir.is_dir() {
        if !sink.required {
            info!(
                "manifest destination {} does not exist, skipping",
                sink.dir.display()
            );
            return Ok(SinkOutcome::Skipped(sink.dir.clone()));
        }

        fs::create_dir_all(&sink.dir).map_err(|e| {
            DeployError::ManifestWrite(format!("creating {}: {}", sink.dir.display(), e))
        })?;
    }

    let path = sink.dir.join(file_name);
    atomic_write(&path, contents)
        .map_err(|e| DeployError::ManifestWrite(format!("{}: {}", path.display(), e)))?;

    info!("wrote manifest to {}", path.display());
    Ok(SinkOutcome::Written(path))
}

/// Replace `path` with `data` through a temporary file in the same
/// directory, so readers never observe a partially written file
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// -----------
// | Readers |
// -----------

/// Read a manifest file
pub fn read_manifest(path: &Path) -> Result<Manifest, DeployError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        DeployError::ManifestWrite(format!(
            "failed to read manifest at {}: {} (has the system been deployed?)",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        DeployError::ManifestWrite(format!("malformed manifest at {}: {}", path.display(), e))
    })
}

/// Read the address of a single unit from a manifest file
pub fn read_deployment(key: &str, path: &Path) -> Result<Address, DeployError> {
    read_manifest(path)?.address_of(key)
}

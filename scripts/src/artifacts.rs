//! Loading of compiled contract artifacts
//!
//! Both the Hardhat layout (`"bytecode": "0x..."`) and the Foundry layout
//! (`"bytecode": { "object": "0x..." }`) are accepted.

use std::{fs, path::Path, str::FromStr};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::DeployError;

/// A compiled contract: its ABI and creation bytecode
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The parsed ABI
    pub abi: JsonAbi,
    /// The ABI exactly as it appeared in the artifact, persisted as the
    /// unit's interface descriptor
    pub abi_json: Value,
    /// The creation bytecode
    pub bytecode: Bytes,
}

/// The on-disk shape of an artifact
#[derive(Deserialize)]
struct ArtifactFile {
    /// The contract ABI
    abi: Value,
    /// The creation bytecode
    bytecode: BytecodeField,
}

/// The two encodings of creation bytecode in use
#[derive(Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    /// Hardhat: a bare hex string
    Hex(String),
    /// Foundry: an object holding the hex string
    Object {
        /// The hex-encoded bytecode
        object: String,
    },
}

impl Artifact {
    /// Build an artifact from its ABI JSON and creation bytecode
    pub fn new(abi_json: Value, bytecode: Bytes) -> Result<Self, DeployError> {
        let abi: JsonAbi = serde_json::from_value(abi_json.clone())
            .map_err(|e| DeployError::ArtifactParsing(e.to_string()))?;

        Ok(Self {
            abi,
            abi_json,
            bytecode,
        })
    }

    /// Parse an artifact from its JSON contents
    pub fn from_json_str(contents: &str) -> Result<Self, DeployError> {
        let file: ArtifactFile = serde_json::from_str(contents)
            .map_err(|e| DeployError::ArtifactParsing(e.to_string()))?;

        let hex = match file.bytecode {
            BytecodeField::Hex(hex) => hex,
            BytecodeField::Object { object } => object,
        };
        let bytecode =
            Bytes::from_str(&hex).map_err(|e| DeployError::ArtifactParsing(e.to_string()))?;
        if bytecode.is_empty() {
            return Err(DeployError::ArtifactParsing(
                "artifact has no creation bytecode (abstract contract or interface?)".to_string(),
            ));
        }

        Self::new(file.abi, bytecode)
    }

    /// Read and parse an artifact file
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DeployError::ArtifactParsing(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json_str(&contents)
            .map_err(|e| DeployError::ArtifactParsing(format!("{}: {}", path.display(), e)))
    }
}

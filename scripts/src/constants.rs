//! Constants used in the deploy scripts

use std::time::Duration;

/// The default path of the deployment configuration file
pub const DEFAULT_CONFIG_PATH: &str = "deploy.json";

/// The default network name, used to select the network profile and to
/// name the manifest file
pub const DEFAULT_NETWORK: &str = "devnet";

/// The default RPC URL, the local Anvil / Hardhat node
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// The environment variable holding the deployer's private key
pub const PKEY_ENV_VAR: &str = "PKEY";

/// The environment variable holding the RPC URL
pub const RPC_URL_ENV_VAR: &str = "RPC_URL";

/// The prefix of the manifest file name, completed as `deployments.<network>.json`
pub const MANIFEST_FILE_PREFIX: &str = "deployments";

/// The extension of the manifest file
pub const MANIFEST_FILE_EXTENSION: &str = "json";

/// The percentage applied to a gas estimate to obtain the declared gas limit
pub const GAS_LIMIT_BUFFER_PERCENT: u64 = 120;

/// The interval at which transaction receipts are polled
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The name of the AccessControl admin role, whose id is the zero word
pub const DEFAULT_ADMIN_ROLE: &str = "DEFAULT_ADMIN_ROLE";

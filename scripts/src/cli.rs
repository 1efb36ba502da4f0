//! Definitions of CLI arguments and commands for the deploy orchestrator

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{deploy, inspect, plan},
    constants::{
        DEFAULT_CONFIG_PATH, DEFAULT_NETWORK, DEFAULT_RPC_URL, PKEY_ENV_VAR, RPC_URL_ENV_VAR,
    },
    errors::DeployError,
};

/// Deploy a system of interdependent contracts in dependency order
#[derive(Parser)]
#[command(name = "deploy-orchestrator", version)]
pub struct Cli {
    /// Path to the deployment configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// The network to deploy to, as declared in the configuration
    #[arg(short, long, default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The orchestrator's commands
#[derive(Subcommand)]
pub enum Command {
    /// Resolve and print the deployment plan without touching the network
    Plan,
    /// Deploy, wire, and persist every unit of the configuration
    Deploy(DeployArgs),
    /// Verify that every unit of a deployments manifest has code on-chain
    Inspect(InspectArgs),
}

impl Command {
    /// Run the command against the configuration at `config` and `network`
    pub async fn run(self, config: &Path, network: &str) -> Result<(), DeployError> {
        match self {
            Command::Plan => plan(config, network),
            Command::Deploy(args) => deploy(args, config, network).await,
            Command::Inspect(args) => inspect(args, config, network).await,
        }
    }
}

/// Deploy the configured system
#[derive(Args)]
pub struct DeployArgs {
    /// Network RPC URL
    #[arg(short, long, env = RPC_URL_ENV_VAR, default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Private key of the deployer
    #[arg(short, long = "pkey", env = PKEY_ENV_VAR, hide_env_values = true)]
    pub priv_key: String,
}

/// Inspect a deployments manifest
#[derive(Args)]
pub struct InspectArgs {
    /// Network RPC URL
    #[arg(short, long, env = RPC_URL_ENV_VAR, default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Path to the manifest, defaults to the manifest of the network in the
    /// first configured destination
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

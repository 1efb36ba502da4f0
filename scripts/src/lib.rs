//! An orchestrator for deploying systems of interdependent smart contracts.
//!
//! A deployment runs in four phases: the dependency order of the units is
//! resolved, each unit is instantiated in that order, the deployed units are
//! wired to one another, and the resulting addresses are persisted to a
//! deployments manifest.

#![deny(missing_docs)]

pub mod artifacts;
pub mod chain;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod errors;
pub mod executor;
pub mod gas;
pub mod manifest;
pub mod orchestrator;
mod solidity;
pub mod state;
pub mod topology;
pub mod types;
pub mod utils;
pub mod wiring;

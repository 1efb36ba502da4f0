//! Helpers for testing deployments against an in-memory chain

pub mod mock_chain;
pub mod utils;

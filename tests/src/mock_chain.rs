//! An in-memory chain client that records every submission and confirmation

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::{address, keccak256, Address, Bytes, TxHash, TxKind};
use scripts::{
    chain::{ChainClient, TxOutcome, TxRequest},
    errors::DeployError,
};

/// The address of the mock deployer, the first Anvil dev account
pub const MOCK_DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
/// The chain id reported by the mock chain
pub const MOCK_CHAIN_ID: u64 = 31337;
/// The gas estimate returned for every transaction
pub const MOCK_GAS_ESTIMATE: u64 = 100_000;

/// An observable event on the mock chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A transaction was submitted
    Submitted {
        /// The hash assigned to the transaction
        tx_hash: TxHash,
        /// A creation or a call
        kind: TxKind,
        /// The creation code or calldata
        input: Bytes,
        /// The declared gas limit
        gas_limit: Option<u64>,
    },
    /// A transaction's receipt was observed
    Confirmed {
        /// The hash of the confirmed transaction
        tx_hash: TxHash,
        /// The address created by the transaction, if any
        contract_address: Option<Address>,
    },
}

/// The mutable state of the mock chain
#[derive(Default)]
struct MockState {
    /// The deployer's next nonce
    nonce: u64,
    /// The outcomes of submitted, unconfirmed transactions
    pending: HashMap<TxHash, TxOutcome>,
    /// The code deployed at each address
    code: HashMap<Address, Bytes>,
    /// Every submission and confirmation, in order
    events: Vec<ChainEvent>,
    /// Transactions whose input starts with one of these prefixes revert
    revert_prefixes: Vec<Bytes>,
    /// Read-only call responses, by function selector
    call_responses: HashMap<[u8; 4], Bytes>,
}

/// A [`ChainClient`] that executes nothing and mines every transaction
/// instantly.
///
/// Created contracts are assigned the deployer's `CREATE` address for the
/// nonce the transaction was submitted with, matching a real chain.
pub struct MockChain {
    /// The deployer account
    deployer: Address,
    /// The reported chain id
    chain_id: u64,
    /// The chain's state
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// A mock chain with the default deployer and chain id
    pub fn new() -> Self {
        Self {
            deployer: MOCK_DEPLOYER,
            chain_id: MOCK_CHAIN_ID,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Report a different chain id
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Use a different deployer account
    pub fn with_deployer(mut self, deployer: Address) -> Self {
        self.deployer = deployer;
        self
    }

    /// Revert every transaction whose input starts with `prefix`
    pub fn revert_on(&self, prefix: impl Into<Bytes>) {
        self.lock().revert_prefixes.push(prefix.into());
    }

    /// Answer read-only calls with the given selector with `output`
    pub fn respond_to(&self, selector: [u8; 4], output: impl Into<Bytes>) {
        self.lock().call_responses.insert(selector, output.into());
    }

    /// Every event observed so far
    pub fn events(&self) -> Vec<ChainEvent> {
        self.lock().events.clone()
    }

    /// The submitted transactions, in order
    pub fn submissions(&self) -> Vec<(TxHash, TxKind, Bytes, Option<u64>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChainEvent::Submitted {
                    tx_hash,
                    kind,
                    input,
                    gas_limit,
                } => Some((tx_hash, kind, input, gas_limit)),
                ChainEvent::Confirmed { .. } => None,
            })
            .collect()
    }

    /// The position in the event log of a transaction's confirmation
    pub fn confirmation_index(&self, tx_hash: TxHash) -> Option<usize> {
        self.events().iter().position(
            |event| matches!(event, ChainEvent::Confirmed { tx_hash: h, .. } if *h == tx_hash),
        )
    }

    /// The position in the event log of a transaction's submission
    pub fn submission_index(&self, tx_hash: TxHash) -> Option<usize> {
        self.events().iter().position(
            |event| matches!(event, ChainEvent::Submitted { tx_hash: h, .. } if *h == tx_hash),
        )
    }

    /// Lock the chain's state
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl ChainClient for MockChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64, DeployError> {
        Ok(self.chain_id)
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64, DeployError> {
        Ok(MOCK_GAS_ESTIMATE)
    }

    async fn submit(&self, tx: TxRequest) -> Result<TxHash, DeployError> {
        let mut state = self.lock();
        let nonce = state.nonce;
        state.nonce += 1;

        let tx_hash = keccak256(nonce.to_be_bytes());
        let reverts = state
            .revert_prefixes
            .iter()
            .any(|prefix| tx.input.starts_with(prefix));

        let contract_address = match tx.kind {
            TxKind::Create if !reverts => {
                let address = self.deployer.create(nonce);
                state.code.insert(address, tx.input.clone());
                Some(address)
            }
            _ => None,
        };

        state.pending.insert(
            tx_hash,
            TxOutcome {
                success: !reverts,
                contract_address,
                block_number: Some(nonce + 1),
                gas_used: tx.gas_limit.unwrap_or(MOCK_GAS_ESTIMATE),
            },
        );
        state.events.push(ChainEvent::Submitted {
            tx_hash,
            kind: tx.kind,
            input: tx.input,
            gas_limit: tx.gas_limit,
        });

        Ok(tx_hash)
    }

    async fn await_receipt(&self, tx_hash: TxHash) -> Result<TxOutcome, DeployError> {
        let mut state = self.lock();
        let outcome =
            state
                .pending
                .remove(&tx_hash)
                .ok_or_else(|| DeployError::TransactionFailure {
                    label: format!("{tx_hash:#x}"),
                    reason: "unknown transaction".to_string(),
                })?;

        state.events.push(ChainEvent::Confirmed {
            tx_hash,
            contract_address: outcome.contract_address,
        });
        Ok(outcome)
    }

    async fn call(&self, _to: Address, input: Bytes) -> Result<Bytes, DeployError> {
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| DeployError::ContractInteraction("calldata too short".to_string()))?;

        self.lock()
            .call_responses
            .get(&selector)
            .cloned()
            .ok_or_else(|| {
                DeployError::ContractInteraction(format!(
                    "no response for selector 0x{}",
                    alloy::hex::encode(selector)
                ))
            })
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        Ok(self.lock().code.get(&address).cloned().unwrap_or_default())
    }
}

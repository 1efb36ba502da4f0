//! The signer/provider capability the orchestrator deploys through

use std::{str::FromStr, time::Duration};

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, TxKind},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use tracing::debug;

use crate::{constants::RECEIPT_POLL_INTERVAL, errors::DeployError};

/// A transaction to submit: a contract creation or a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// `Create` for an instantiation, `Call` for a method call
    pub kind: TxKind,
    /// The creation code with encoded constructor arguments, or the calldata
    pub input: Bytes,
    /// The declared gas limit, if already determined
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    /// A contract creation transaction
    pub fn create(input: Bytes) -> Self {
        Self {
            kind: TxKind::Create,
            input,
            gas_limit: None,
        }
    }

    /// A method call transaction
    pub fn call(to: Address, input: Bytes) -> Self {
        Self {
            kind: TxKind::Call(to),
            input,
            gas_limit: None,
        }
    }

    /// Set the declared gas limit
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// The observed result of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// Whether the transaction executed successfully
    pub success: bool,
    /// The address of the contract created by the transaction
    pub contract_address: Option<Address>,
    /// The block the transaction was included in
    pub block_number: Option<u64>,
    /// The gas consumed by the transaction
    pub gas_used: u64,
}

/// The network capability the orchestrator needs: submitting transactions,
/// awaiting their confirmation, and read-only calls.
///
/// Submission and confirmation are separate so that independent transactions
/// can be submitted back to back and confirmed as a batch.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// The address transactions are sent from
    fn deployer(&self) -> Address;

    /// The chain id reported by the endpoint
    async fn chain_id(&self) -> Result<u64, DeployError>;

    /// Estimate the gas a transaction would consume
    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, DeployError>;

    /// Submit a transaction without waiting for it to be included
    async fn submit(&self, tx: TxRequest) -> Result<TxHash, DeployError>;

    /// Wait until a submitted transaction is included and return its outcome
    async fn await_receipt(&self, tx_hash: TxHash) -> Result<TxOutcome, DeployError>;

    /// Evaluate a read-only call against the latest state
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, DeployError>;

    /// The runtime code deployed at an address
    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError>;
}

// ----------------
// | Alloy Client |
// ----------------

/// A [`ChainClient`] over an alloy provider
#[derive(Clone)]
pub struct AlloyClient {
    /// The provider, with a signing wallet attached when deploying
    provider: DynProvider,
    /// The signer's address, or the zero address for a read-only client
    deployer: Address,
    /// The interval at which receipts are polled
    poll_interval: Duration,
}

impl AlloyClient {
    /// Set up a signing client from a private key and RPC url.
    ///
    /// Nonces are cached locally so that transactions can be submitted back
    /// to back without waiting for the previous one to be mined.
    pub fn connect(priv_key: &str, rpc_url: &str) -> Result<Self, DeployError> {
        let url = parse_url(rpc_url)?;
        let signer = PrivateKeySigner::from_str(priv_key)
            .map_err(|e| DeployError::ClientInitialization(e.to_string()))?;
        let deployer = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(signer)
            .with_cached_nonce_management()
            .connect_http(url);

        Ok(Self {
            provider: DynProvider::new(provider),
            deployer,
            poll_interval: RECEIPT_POLL_INTERVAL,
        })
    }

    /// Set up a client that can only read chain state
    pub fn connect_read_only(rpc_url: &str) -> Result<Self, DeployError> {
        let url = parse_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            provider: DynProvider::new(provider),
            deployer: Address::ZERO,
            poll_interval: RECEIPT_POLL_INTERVAL,
        })
    }

    /// Convert a request into an alloy transaction request
    fn to_request(&self, tx: &TxRequest) -> TransactionRequest {
        let request = match tx.kind {
            TxKind::Create => TransactionRequest::default().with_deploy_code(tx.input.clone()),
            TxKind::Call(to) => TransactionRequest::default()
                .with_to(to)
                .with_input(tx.input.clone()),
        };
        let mut request = request.with_from(self.deployer);
        if let Some(gas_limit) = tx.gas_limit {
            request = request.with_gas_limit(gas_limit);
        }

        request
    }
}

impl ChainClient for AlloyClient {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64, DeployError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| DeployError::ClientInitialization(e.to_string()))
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, DeployError> {
        self.provider
            .estimate_gas(self.to_request(tx))
            .await
            .map_err(|e| DeployError::CalldataConstruction(format!("gas estimation failed: {e}")))
    }

    async fn submit(&self, tx: TxRequest) -> Result<TxHash, DeployError> {
        let pending = self
            .provider
            .send_transaction(self.to_request(&tx))
            .await
            .map_err(|e| DeployError::TransactionFailure {
                label: "submission".to_string(),
                reason: e.to_string(),
            })?;

        Ok(*pending.tx_hash())
    }

    async fn await_receipt(&self, tx_hash: TxHash) -> Result<TxOutcome, DeployError> {
        // Poll rather than watch the pending transaction, a stuck transaction
        // stalls the run until it is included
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| DeployError::TransactionFailure {
                    label: format!("{tx_hash:#x}"),
                    reason: e.to_string(),
                })?;

            match receipt {
                Some(receipt) => {
                    return Ok(TxOutcome {
                        success: receipt.status(),
                        contract_address: receipt.contract_address,
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                    })
                }
                None => {
                    debug!("waiting for receipt of {tx_hash:#x}");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, DeployError> {
        let request = TransactionRequest::default().with_to(to).with_input(input);
        self.provider
            .call(request)
            .await
            .map_err(|e| DeployError::ContractInteraction(e.to_string()))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| DeployError::ContractInteraction(e.to_string()))
    }
}

/// Parse an RPC url
fn parse_url(rpc_url: &str) -> Result<Url, DeployError> {
    Url::parse(rpc_url).map_err(|e| DeployError::ClientInitialization(e.to_string()))
}

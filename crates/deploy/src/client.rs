//! Chain client interface and its JSON-RPC implementation.
//!
//! The active network and the submitting identity are explicit properties of the client
//! rather than process-wide state, so everything above it can run against a mock.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::{Network, rpc};

/// Interval between two receipt lookups.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A submitted transaction that has not been confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: B256,
}

/// The confirmed outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
    /// Address of the created contract, for deployments.
    pub contract_address: Option<Address>,
}

/// Access to one network through one submitting identity.
pub trait ChainClient: Send + Sync {
    /// The network this client is connected to.
    fn network(&self) -> &Network;

    /// The identity submitting transactions.
    fn sender(&self) -> Address;

    /// Native balance of the sender.
    fn balance(&self) -> impl Future<Output = Result<U256>> + Send;

    /// Submit a contract creation with the given init code and ABI-encoded constructor arguments.
    fn deploy(
        &self,
        init_code: Bytes,
        constructor_args: Bytes,
    ) -> impl Future<Output = Result<PendingTx>> + Send;

    /// Submit a state-changing call.
    fn call(&self, to: Address, calldata: Bytes) -> impl Future<Output = Result<PendingTx>> + Send;

    /// Execute a read-only call against the latest state.
    fn read(&self, to: Address, calldata: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// Wait until a submitted transaction is mined.
    fn confirm(&self, pending: PendingTx) -> impl Future<Output = Result<Receipt>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    /// Absent on pre-Byzantium chains.
    status: Option<U64>,
    contract_address: Option<Address>,
}

impl From<RpcReceipt> for Receipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.to::<u64>(),
            success: receipt.status.is_none_or(|status| status == U64::from(1)),
            contract_address: receipt.contract_address,
        }
    }
}

/// [`ChainClient`] over Ethereum JSON-RPC.
///
/// Transactions are sent with `eth_sendTransaction`, so the sender must be an account managed
/// by the node (a Hardhat/Anvil dev node, or a signing proxy in front of a public endpoint).
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    http: reqwest::Client,
    rpc_url: Url,
    network: Network,
    sender: Address,
    confirmation_timeout: Option<Duration>,
}

impl RpcChainClient {
    /// Connect to an endpoint and resolve the network and the sender.
    ///
    /// # Arguments
    /// * `rpc_url` - The JSON-RPC endpoint
    /// * `network_name` - Registry key of the network; derived from the chain id when absent
    /// * `sender` - Submitting account; the node's first account when absent
    pub async fn connect(
        rpc_url: Url,
        network_name: Option<String>,
        sender: Option<Address>,
    ) -> Result<Self> {
        let http = rpc::create_client()?;

        let chain_id: U64 = rpc::json_rpc_call(&http, rpc_url.as_str(), "eth_chainId", vec![])
            .await
            .context("Failed to fetch chain id")?;
        let chain_id = chain_id.to::<u64>();

        let network = match network_name {
            Some(name) => Network::new(name, chain_id),
            None => Network::from_chain_id(chain_id),
        };

        let sender = match sender {
            Some(sender) => sender,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&http, rpc_url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to fetch node accounts")?;

                *accounts
                    .first()
                    .context("Node exposes no accounts; configure a sender")?
            }
        };

        tracing::debug!(rpc_url = %rpc_url, network = %network, sender = %sender, "Connected to chain");

        Ok(Self {
            http,
            rpc_url,
            network,
            sender,
            confirmation_timeout: None,
        })
    }

    /// Bound the time spent waiting for a receipt. Unbounded by default.
    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        rpc::json_rpc_call(&self.http, self.rpc_url.as_str(), method, params).await
    }

    async fn send_transaction(&self, tx: Value) -> Result<PendingTx> {
        let tx_hash: B256 = self
            .request("eth_sendTransaction", vec![tx])
            .await
            .context("Failed to send transaction")?;

        tracing::debug!(tx_hash = %tx_hash, "Transaction submitted");

        Ok(PendingTx { tx_hash })
    }
}

impl ChainClient for RpcChainClient {
    fn network(&self) -> &Network {
        &self.network
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn balance(&self) -> Result<U256> {
        self.request("eth_getBalance", vec![json!(self.sender), json!("latest")])
            .await
            .context("Failed to fetch sender balance")
    }

    async fn deploy(&self, init_code: Bytes, constructor_args: Bytes) -> Result<PendingTx> {
        let data: Bytes = [init_code.as_ref(), constructor_args.as_ref()].concat().into();

        self.send_transaction(json!({
            "from": self.sender,
            "data": data,
        }))
        .await
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<PendingTx> {
        self.send_transaction(json!({
            "from": self.sender,
            "to": to,
            "data": calldata,
        }))
        .await
    }

    async fn read(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        self.request(
            "eth_call",
            vec![
                json!({ "from": self.sender, "to": to, "data": calldata }),
                json!("latest"),
            ],
        )
        .await
        .with_context(|| format!("eth_call to {to} failed"))
    }

    async fn confirm(&self, pending: PendingTx) -> Result<Receipt> {
        let tx_hash = pending.tx_hash;

        let receipt = rpc::poll_until(
            &format!("receipt of {tx_hash}"),
            self.confirmation_timeout,
            RECEIPT_POLL_INTERVAL,
            || async move {
                self.request::<Option<RpcReceipt>>("eth_getTransactionReceipt", vec![json!(tx_hash)])
                    .await
            },
        )
        .await?;

        let receipt = Receipt::from(receipt);
        tracing::debug!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "Transaction mined");

        Ok(receipt)
    }
}

//! Step executors.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, keccak256};
use anyhow::{Context, Result};

use crate::{
    ArtifactStore, ChainClient, ContractKind,
    client::{PendingTx, Receipt},
};

/// Performs the on-chain effect of each step.
///
/// Inputs are always supplied by the caller; executors never consult the address registry
/// and never write to it. Every method returns only once its transactions are confirmed.
pub trait StepExecutor: Send + Sync {
    /// Deploy the factory with `fee_to_setter` as constructor argument.
    fn deploy_factory(&self, fee_to_setter: Address)
    -> impl Future<Output = Result<Address>> + Send;

    /// Point the factory's fee recipient at `fee_to`.
    ///
    /// Returns the hash of the confirmed transaction, or `None` when no transaction was needed.
    fn configure_factory(
        &self,
        factory: Address,
        fee_to: Address,
    ) -> impl Future<Output = Result<Option<B256>>> + Send;

    /// Deploy the router against `factory` and the network's wrapped native token.
    fn deploy_router(
        &self,
        factory: Address,
        wrapped_native: Address,
    ) -> impl Future<Output = Result<Address>> + Send;
}

/// Four-byte function selector of a Solidity signature.
fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// ABI-encode a list of static address arguments, one 32-byte word each.
fn encode_addresses(args: &[Address]) -> Vec<u8> {
    args.iter().flat_map(|addr| addr.into_word().0).collect()
}

/// Encode a call to `signature` taking address arguments.
fn encode_call(signature: &str, args: &[Address]) -> Bytes {
    let mut calldata = selector(signature).to_vec();
    calldata.extend(encode_addresses(args));
    calldata.into()
}

/// Decode a single returned address word.
fn decode_address(output: &[u8]) -> Result<Address> {
    if output.len() < 32 {
        anyhow::bail!("Expected a 32-byte address word, got {} bytes", output.len());
    }

    Ok(Address::from_word(B256::from_slice(&output[..32])))
}

/// Production [`StepExecutor`] backed by a [`ChainClient`] and compiled artifacts.
#[derive(Debug, Clone)]
pub struct ChainStepExecutor<C> {
    client: C,
    artifacts: ArtifactStore,
}

impl<C: ChainClient> ChainStepExecutor<C> {
    pub fn new(client: C, artifacts: ArtifactStore) -> Self {
        Self { client, artifacts }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Wait for a transaction and fail on revert.
    async fn confirm(&self, pending: PendingTx, what: &str) -> Result<Receipt> {
        let receipt = self
            .client
            .confirm(pending)
            .await
            .with_context(|| format!("Failed to confirm {what}"))?;

        if !receipt.success {
            anyhow::bail!("{} reverted in transaction {}", what, receipt.tx_hash);
        }

        Ok(receipt)
    }

    async fn deploy_contract(&self, kind: ContractKind, args: &[Address]) -> Result<Address> {
        let artifact = self.artifacts.load(kind)?;
        let constructor_args = Bytes::from(encode_addresses(args));

        tracing::info!(contract = %kind, args = ?args, "Deploying contract...");

        let pending = self
            .client
            .deploy(artifact.bytecode, constructor_args)
            .await
            .with_context(|| format!("Failed to submit {kind} deployment"))?;

        let what = format!("{kind} deployment");
        let receipt = self.confirm(pending, &what).await?;

        receipt.contract_address.with_context(|| {
            format!(
                "Receipt of {} deployment {} has no contract address",
                kind, receipt.tx_hash
            )
        })
    }
}

impl<C: ChainClient> StepExecutor for ChainStepExecutor<C> {
    async fn deploy_factory(&self, fee_to_setter: Address) -> Result<Address> {
        self.deploy_contract(ContractKind::UniswapV2Factory, &[fee_to_setter])
            .await
    }

    async fn configure_factory(&self, factory: Address, fee_to: Address) -> Result<Option<B256>> {
        let current = self
            .client
            .read(factory, encode_call("feeTo()", &[]))
            .await
            .context("Failed to read current fee recipient")?;

        if decode_address(&current)? == fee_to {
            tracing::info!(factory = %factory, fee_to = %fee_to, "Fee recipient already set, no transaction needed");
            return Ok(None);
        }

        let pending = self
            .client
            .call(factory, encode_call("setFeeTo(address)", &[fee_to]))
            .await
            .context("Failed to submit setFeeTo")?;

        let receipt = self.confirm(pending, "setFeeTo").await?;

        Ok(Some(receipt.tx_hash))
    }

    async fn deploy_router(&self, factory: Address, wrapped_native: Address) -> Result<Address> {
        self.deploy_contract(ContractKind::FairSwapRouter, &[factory, wrapped_native])
            .await
    }
}

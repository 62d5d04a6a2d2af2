//! Source verification of deployed contracts on a block explorer.
//!
//! Verification is best effort: outcomes are logged and reported, never fed back into the
//! deployment state.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{AddressRegistry, ArtifactStore, ContractKind, Network, network, rpc};

/// Interval between two verification status checks.
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum time to wait for the explorer to process a submission.
const STATUS_TIMEOUT: Duration = Duration::from_secs(180);

/// A request to verify one deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub contract: ContractKind,
    pub address: Address,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
}

/// A block-explorer verification service.
pub trait Verifier: Send + Sync {
    fn verify(&self, request: &VerificationRequest) -> impl Future<Output = Result<()>> + Send;
}

/// Explorer API access configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Etherscan-compatible API endpoint, e.g. `https://api.etherscan.io/v2/api`.
    pub api_url: Url,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// [`Verifier`] speaking the Etherscan-style `verifysourcecode` API.
#[derive(Debug, Clone)]
pub struct ExplorerVerifier {
    http: reqwest::Client,
    config: ExplorerConfig,
    chain_id: u64,
    artifacts: ArtifactStore,
}

impl ExplorerVerifier {
    pub fn new(config: ExplorerConfig, chain_id: u64, artifacts: ArtifactStore) -> Result<Self> {
        Ok(Self {
            http: rpc::create_client()?,
            config,
            chain_id,
            artifacts,
        })
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<String> {
        let artifact = self.artifacts.load(request.contract)?;
        let build_info = self.artifacts.build_info(request.contract)?;
        let source = serde_json::to_string(&build_info.input)
            .context("Failed to serialize compiler input")?;

        let form = [
            ("apikey", self.config.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", source),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", artifact.qualified_name()),
            ("compilerversion", format!("v{}", build_info.solc_long_version)),
            ("constructorArguements", hex::encode(&request.constructor_args)),
        ];

        let response: ExplorerResponse = self
            .http
            .post(self.config.api_url.clone())
            .query(&[("chainid", self.chain_id)])
            .form(&form)
            .send()
            .await
            .context("Failed to send verification request")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        if response.status != "1" {
            anyhow::bail!(
                "Explorer rejected verification: {} {}",
                response.message,
                response.result
            );
        }

        Ok(response.result)
    }

    async fn check_status(&self, guid: &str) -> Result<Option<()>> {
        let response: ExplorerResponse = self
            .http
            .get(self.config.api_url.clone())
            .query(&[
                ("chainid", self.chain_id.to_string()),
                ("apikey", self.config.api_key.clone()),
                ("module", "contract".to_string()),
                ("action", "checkverifystatus".to_string()),
                ("guid", guid.to_string()),
            ])
            .send()
            .await
            .context("Failed to send verification status request")?
            .json()
            .await
            .context("Failed to parse verification status response")?;

        verification_status(&response)
    }
}

/// Interpret a `checkverifystatus` response: `Some(())` when verified, `None` while pending.
fn verification_status(response: &ExplorerResponse) -> Result<Option<()>> {
    if response.status == "1" || response.result.contains("Already Verified") {
        return Ok(Some(()));
    }

    if response.result.contains("Pending") {
        return Ok(None);
    }

    anyhow::bail!("Verification failed: {}", response.result)
}

impl Verifier for ExplorerVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<()> {
        let guid = match self.submit(request).await {
            Ok(guid) => guid,
            Err(e) if e.to_string().contains("Already Verified") => return Ok(()),
            Err(e) => return Err(e),
        };

        tracing::debug!(contract = %request.contract, guid = %guid, "Verification submitted");

        rpc::poll_until(
            &format!("verification of {}", request.contract),
            Some(STATUS_TIMEOUT),
            STATUS_POLL_INTERVAL,
            || self.check_status(&guid),
        )
        .await
    }
}

/// Outcome of verifying the contracts of one network.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub verified: Vec<ContractKind>,
    pub failed: Vec<(ContractKind, String)>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the verification requests for every contract recorded on a network.
///
/// The registry does not store constructor arguments, so they are rebuilt: the factory with
/// `fee_to_setter`, the router with the recorded factory and the network's wrapped native
/// token. `fee_to_setter` must be the account that deployed the factory; verifying from
/// another sender produces arguments that do not match the deployed bytecode.
pub fn verification_requests(
    registry: &AddressRegistry,
    network: &Network,
    fee_to_setter: Address,
) -> Result<Vec<VerificationRequest>> {
    let contracts = registry.contracts(&network.name)?;
    let mut requests = Vec::new();

    let factory = contracts.get(ContractKind::UniswapV2Factory.as_ref()).copied();

    if let Some(address) = factory {
        requests.push(VerificationRequest {
            contract: ContractKind::UniswapV2Factory,
            address,
            constructor_args: fee_to_setter.into_word().to_vec().into(),
        });
    }

    if let Some(address) = contracts.get(ContractKind::FairSwapRouter.as_ref()).copied() {
        let factory = factory.context("Router is recorded without a factory")?;
        let params = network::resolve(network.chain_id)?;

        let mut args = factory.into_word().to_vec();
        args.extend_from_slice(params.wrapped_native.into_word().as_slice());

        requests.push(VerificationRequest {
            contract: ContractKind::FairSwapRouter,
            address,
            constructor_args: args.into(),
        });
    }

    Ok(requests)
}

/// Verify every contract recorded for a network.
///
/// Failures are logged and collected; they never abort the remaining verifications.
/// `fee_to_setter` is the factory's constructor argument, see [`verification_requests`].
pub async fn verify_all<V: Verifier>(
    verifier: &V,
    registry: &AddressRegistry,
    network: &Network,
    fee_to_setter: Address,
) -> Result<VerificationReport> {
    let requests = verification_requests(registry, network, fee_to_setter)?;
    let mut report = VerificationReport::default();

    if requests.is_empty() {
        tracing::warn!(network = %network, "No recorded contracts to verify");
    }

    for request in requests {
        match verifier.verify(&request).await {
            Ok(()) => {
                tracing::info!(contract = %request.contract, address = %request.address, network = %network, "Verified contract");
                report.verified.push(request.contract);
            }
            Err(e) => {
                tracing::warn!(contract = %request.contract, address = %request.address, err = %e, "Verification failed");
                report.failed.push((request.contract, format!("{e:#}")));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: &str, result: &str) -> ExplorerResponse {
        ExplorerResponse {
            status: status.to_string(),
            message: String::new(),
            result: result.to_string(),
        }
    }

    #[test]
    fn test_verification_status() {
        assert!(matches!(
            verification_status(&response("1", "Pass - Verified")),
            Ok(Some(()))
        ));
        assert!(matches!(
            verification_status(&response("0", "Already Verified")),
            Ok(Some(()))
        ));
        assert!(matches!(
            verification_status(&response("0", "Pending in queue")),
            Ok(None)
        ));
        assert!(verification_status(&response("0", "Fail - Unable to verify")).is_err());
    }
}

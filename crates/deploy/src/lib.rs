//! fairswap-deploy - Deployment library for the FairSwap contracts.
//!
//! This crate deploys and configures the FairSwap factory and router on EVM networks,
//! recording every deployed address in a JSON registry so that runs can be split across
//! invocations and resumed after a failure.

pub mod artifacts;
pub mod client;
pub mod config;
mod error;
pub mod network;
mod orchestrator;
pub mod registry;
pub mod rpc;
pub mod steps;
pub mod verify;

pub use artifacts::{Artifact, ArtifactStore, ContractKind};
pub use client::{ChainClient, PendingTx, Receipt, RpcChainClient};
pub use config::{CONFIG_FILENAME, DeployConfig};
pub use error::DeployError;
pub use network::{Network, NetworkParams, SupportedChain};
pub use orchestrator::{Orchestrator, RunReport, StepOutcome};
pub use registry::{AddressRegistry, AddressStore, RegistryLock};
pub use steps::{ChainStepExecutor, Selection, StepExecutor, StepId};
pub use verify::{
    ExplorerConfig, ExplorerVerifier, VerificationReport, VerificationRequest, Verifier,
    verify_all,
};

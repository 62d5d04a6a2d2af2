//! Error taxonomy for deployment runs.
//!
//! Every variant aborts the current run. Callers match on the kind instead of
//! parsing messages.

use std::path::PathBuf;

use crate::steps::StepId;

/// Errors surfaced by the registry, the network resolver and the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The registry has no entry for the requested network or contract.
    #[error("no address recorded for {contract} on {network}")]
    NotFound { network: String, contract: String },

    /// No network parameters are known for this chain id.
    #[error("unsupported chain id: {0}")]
    UnsupportedChain(u64),

    /// A step executor failed to submit or confirm its operations.
    #[error("step {step} failed")]
    ExecutionFailed {
        step: StepId,
        #[source]
        source: anyhow::Error,
    },

    /// The orchestrator could not assemble the inputs of a step.
    #[error("step {step} is missing its {input} input; run the step that produces it first")]
    UnresolvedDependency { step: StepId, input: String },

    /// The registry file could not be created or read.
    #[error("failed to initialize address registry at {}", path.display())]
    StoreInitFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The registry file could not be persisted.
    #[error("failed to write address registry at {}", path.display())]
    StoreWriteFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Another run currently owns the registry.
    #[error("address registry at {} is locked by another run", path.display())]
    StoreLocked { path: PathBuf },

    /// The selection names a step outside the canonical set.
    #[error("unknown step id: {0}")]
    UnknownStep(u8),

    /// A registry or network error raised while running a step.
    #[error("step {step} failed")]
    InStep {
        step: StepId,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// The step the error is attached to, if any.
    pub fn step(&self) -> Option<StepId> {
        match self {
            DeployError::ExecutionFailed { step, .. }
            | DeployError::UnresolvedDependency { step, .. }
            | DeployError::InStep { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying error, without the step it was raised in.
    pub fn cause(&self) -> &DeployError {
        match self {
            DeployError::InStep { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Attach `step` unless the error already names one.
    pub(crate) fn in_step(self, step: StepId) -> Self {
        if self.step().is_some() {
            return self;
        }

        DeployError::InStep {
            step,
            source: Box::new(self),
        }
    }
}

//! Deployment orchestrator.
//!
//! Walks the canonical steps in order, runs the selected ones and records every produced
//! address before moving on. The first failure aborts the run; whatever completed before it
//! stays in the registry, so a run can be resumed by selecting the remaining steps.

use std::collections::HashMap;

use alloy_core::primitives::{Address, B256};

use crate::{
    AddressStore, ContractKind, DeployError, Network, Selection, StepExecutor, StepId, network,
};

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A contract was deployed and recorded.
    Deployed {
        contract: ContractKind,
        address: Address,
    },
    /// An already deployed contract was reconfigured.
    ///
    /// `tx_hash` is `None` when the on-chain state already matched.
    Configured {
        target: Address,
        tx_hash: Option<B256>,
    },
    /// The contract was already recorded and the deploy step was skipped.
    AlreadyDeployed {
        contract: ContractKind,
        address: Address,
    },
}

/// Per-step outcomes of a completed run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<(StepId, StepOutcome)>,
}

impl RunReport {
    /// The address recorded for a contract during the run, if any.
    pub fn address_of(&self, contract: ContractKind) -> Option<Address> {
        self.steps.iter().find_map(|(_, outcome)| match outcome {
            StepOutcome::Deployed {
                contract: c,
                address,
            }
            | StepOutcome::AlreadyDeployed {
                contract: c,
                address,
            } if *c == contract => Some(*address),
            _ => None,
        })
    }
}

/// Addresses produced or loaded during one run.
type Resolved = HashMap<ContractKind, Address>;

/// Drives a selection of steps against one network.
pub struct Orchestrator<S, E> {
    store: S,
    executor: E,
    network: Network,
    /// Identity deploying the contracts, also the factory's `feeToSetter`.
    deployer: Address,
    /// Recipient configured by step 2.
    fee_to: Address,
    skip_deployed: bool,
}

impl<S: AddressStore, E: StepExecutor> Orchestrator<S, E> {
    /// Create an orchestrator. The fee recipient defaults to the deployer.
    pub fn new(store: S, executor: E, network: Network, deployer: Address) -> Self {
        Self {
            store,
            executor,
            network,
            deployer,
            fee_to: deployer,
            skip_deployed: false,
        }
    }

    /// Set the recipient configured by the factory configuration step.
    pub fn fee_to(mut self, fee_to: Address) -> Self {
        self.fee_to = fee_to;
        self
    }

    /// Skip selected deploy steps whose contract is already recorded for the network.
    pub fn skip_deployed(mut self, skip_deployed: bool) -> Self {
        self.skip_deployed = skip_deployed;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Run the selected steps in canonical order.
    pub async fn run(&self, selection: &Selection) -> Result<RunReport, DeployError> {
        let _guard = self.store.acquire()?;
        self.store.ensure_store(&self.network.name)?;

        tracing::info!(
            network = %self.network,
            deployer = %self.deployer,
            steps = ?selection.ids(),
            "Starting deployment run..."
        );

        let mut resolved = Resolved::new();
        let mut report = RunReport::default();

        for step in StepId::CANONICAL {
            if !selection.contains(step) {
                tracing::debug!(step = %step, "Step not selected, skipping");
                continue;
            }

            let outcome = match self.run_step(step, &mut resolved).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let e = e.in_step(step);
                    tracing::error!(step = %step, network = %self.network, err = %e, "Step failed, aborting run");
                    return Err(e);
                }
            };

            report.steps.push((step, outcome));
        }

        tracing::info!(network = %self.network, completed = report.steps.len(), "Deployment run complete");

        Ok(report)
    }

    async fn run_step(&self, step: StepId, resolved: &mut Resolved) -> Result<StepOutcome, DeployError> {
        match step {
            StepId::DeployFactory => {
                let contract = ContractKind::UniswapV2Factory;
                if let Some(outcome) = self.recorded(contract, resolved)? {
                    return Ok(outcome);
                }

                let address = self
                    .executor
                    .deploy_factory(self.deployer)
                    .await
                    .map_err(|source| DeployError::ExecutionFailed { step, source })?;

                self.record(step, contract, address, resolved)?;
                tracing::info!(step = %step, factory = %address, "Success: deployed factory");

                Ok(StepOutcome::Deployed { contract, address })
            }
            StepId::ConfigureFactory => {
                let factory = self.resolve(step, ContractKind::UniswapV2Factory, resolved)?;

                let tx_hash = self
                    .executor
                    .configure_factory(factory, self.fee_to)
                    .await
                    .map_err(|source| DeployError::ExecutionFailed { step, source })?;

                tracing::info!(
                    step = %step,
                    factory = %factory,
                    fee_to = %self.fee_to,
                    tx_hash = ?tx_hash,
                    "Success: set factory fee recipient"
                );

                Ok(StepOutcome::Configured {
                    target: factory,
                    tx_hash,
                })
            }
            StepId::DeployRouter => {
                let contract = ContractKind::FairSwapRouter;
                if let Some(outcome) = self.recorded(contract, resolved)? {
                    return Ok(outcome);
                }

                let factory = self.resolve(step, ContractKind::UniswapV2Factory, resolved)?;
                let params = network::resolve(self.network.chain_id)?;

                let address = self
                    .executor
                    .deploy_router(factory, params.wrapped_native)
                    .await
                    .map_err(|source| DeployError::ExecutionFailed { step, source })?;

                self.record(step, contract, address, resolved)?;
                tracing::info!(
                    step = %step,
                    router = %address,
                    factory = %factory,
                    wrapped_native = %params.wrapped_native,
                    "Success: deployed router"
                );

                Ok(StepOutcome::Deployed { contract, address })
            }
        }
    }

    /// Resolve a prerequisite address, preferring one produced earlier in this run.
    fn resolve(
        &self,
        step: StepId,
        contract: ContractKind,
        resolved: &Resolved,
    ) -> Result<Address, DeployError> {
        if let Some(address) = resolved.get(&contract) {
            return Ok(*address);
        }

        match self.store.get(&self.network.name, contract.as_ref()) {
            Ok(address) => {
                tracing::debug!(step = %step, contract = %contract, address = %address, "Resolved input from registry");
                Ok(address)
            }
            Err(DeployError::NotFound { .. }) => Err(DeployError::UnresolvedDependency {
                step,
                input: contract.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// With `skip_deployed`, load an already recorded contract instead of deploying it again.
    fn recorded(
        &self,
        contract: ContractKind,
        resolved: &mut Resolved,
    ) -> Result<Option<StepOutcome>, DeployError> {
        if !self.skip_deployed {
            return Ok(None);
        }

        match self.store.get(&self.network.name, contract.as_ref()) {
            Ok(address) => {
                tracing::info!(contract = %contract, address = %address, "Already deployed, skipping");
                resolved.insert(contract, address);
                Ok(Some(StepOutcome::AlreadyDeployed { contract, address }))
            }
            Err(DeployError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist a produced address and remember it for the rest of the run.
    fn record(
        &self,
        step: StepId,
        contract: ContractKind,
        address: Address,
        resolved: &mut Resolved,
    ) -> Result<(), DeployError> {
        if let Err(e) = self.store.set(&self.network.name, contract.as_ref(), address) {
            tracing::error!(
                step = %step,
                network = %self.network,
                contract = %contract,
                address = %address,
                "Contract deployed but its address could not be recorded; add it to the registry by hand"
            );
            return Err(e);
        }

        resolved.insert(contract, address);
        Ok(())
    }
}

//! Integration tests for the deployment orchestrator.
//!
//! Executors, chain clients and verifiers are in-process mocks; the registry is a real JSON
//! file in a temporary directory. No network access is needed.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use alloy_core::primitives::{Address, B256, Bytes, U256, address};
use anyhow::Result;
use fairswap_deploy::{
    AddressRegistry, AddressStore, ArtifactStore, ChainClient, ChainStepExecutor, ContractKind,
    DeployError, Network, Orchestrator, PendingTx, Receipt, Selection, StepExecutor, StepId,
    StepOutcome, VerificationRequest, Verifier, verify_all,
};
use tempdir::TempDir;

const DEPLOYER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
const FACTORY: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
const ROUTER: Address = address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512");
const DECOY: Address = address!("dead00000000000000000000000000000000beef");
const AMOY_WPOL: Address = address!("360ad4f9a9a8efe9a8dcb5f461c4cc1047e1dcf9");

fn amoy() -> Network {
    Network::new("polygonAmoy", 80002)
}

/// A call received by [`MockExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    DeployFactory { fee_to_setter: Address },
    ConfigureFactory { factory: Address, fee_to: Address },
    DeployRouter { factory: Address, wrapped_native: Address },
}

/// Records invocations and returns canned results.
#[derive(Clone, Default)]
struct MockExecutor {
    calls: Arc<Mutex<Vec<Invocation>>>,
    fail_on: Option<StepId>,
}

impl MockExecutor {
    fn failing_on(step: StepId) -> Self {
        Self {
            fail_on: Some(step),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    fn invoke(&self, step: StepId, invocation: Invocation) -> Result<()> {
        self.calls.lock().unwrap().push(invocation);
        if self.fail_on == Some(step) {
            anyhow::bail!("transaction underpriced");
        }
        Ok(())
    }
}

impl StepExecutor for MockExecutor {
    async fn deploy_factory(&self, fee_to_setter: Address) -> Result<Address> {
        self.invoke(
            StepId::DeployFactory,
            Invocation::DeployFactory { fee_to_setter },
        )?;
        Ok(FACTORY)
    }

    async fn configure_factory(&self, factory: Address, fee_to: Address) -> Result<Option<B256>> {
        self.invoke(
            StepId::ConfigureFactory,
            Invocation::ConfigureFactory { factory, fee_to },
        )?;
        Ok(Some(B256::repeat_byte(0x22)))
    }

    async fn deploy_router(&self, factory: Address, wrapped_native: Address) -> Result<Address> {
        self.invoke(
            StepId::DeployRouter,
            Invocation::DeployRouter {
                factory,
                wrapped_native,
            },
        )?;
        Ok(ROUTER)
    }
}

/// Store whose lookups always return a stale decoy address.
#[derive(Default)]
struct DecoyStore {
    gets: Mutex<Vec<String>>,
    sets: Mutex<Vec<(String, Address)>>,
}

impl AddressStore for DecoyStore {
    type Guard = ();

    fn acquire(&self) -> Result<(), DeployError> {
        Ok(())
    }

    fn ensure_store(&self, _network: &str) -> Result<(), DeployError> {
        Ok(())
    }

    fn get(&self, _network: &str, contract: &str) -> Result<Address, DeployError> {
        self.gets.lock().unwrap().push(contract.to_string());
        Ok(DECOY)
    }

    fn set(&self, _network: &str, contract: &str, address: Address) -> Result<(), DeployError> {
        self.sets.lock().unwrap().push((contract.to_string(), address));
        Ok(())
    }
}

struct TestContext {
    _dir: TempDir,
    registry: AddressRegistry,
}

impl TestContext {
    fn new() -> Self {
        let dir = TempDir::new("fairswap-orchestrator").expect("Failed to create temp dir");
        let registry = AddressRegistry::new(dir.path().join("deployment.json"));
        Self {
            _dir: dir,
            registry,
        }
    }

    fn orchestrator(&self, executor: MockExecutor) -> Orchestrator<AddressRegistry, MockExecutor> {
        Orchestrator::new(self.registry.clone(), executor, amoy(), DEPLOYER)
    }

    fn registry_json(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(self.registry.path()).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

fn selection(ids: &[u8]) -> Selection {
    Selection::from_ids(ids).unwrap()
}

#[tokio::test]
async fn test_selection_filtering_runs_only_selected_step() {
    let ctx = TestContext::new();
    ctx.registry.set("polygonAmoy", "UniswapV2Factory", FACTORY).unwrap();

    let executor = MockExecutor::default();
    let report = ctx
        .orchestrator(executor.clone())
        .run(&selection(&[2]))
        .await
        .unwrap();

    assert_eq!(
        executor.calls(),
        vec![Invocation::ConfigureFactory {
            factory: FACTORY,
            fee_to: DEPLOYER
        }]
    );
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].0, StepId::ConfigureFactory);
}

#[tokio::test]
async fn test_end_to_end_across_two_runs() {
    let ctx = TestContext::new();

    // First run: deploy the factory on a clean registry.
    let first = MockExecutor::default();
    let report = ctx
        .orchestrator(first.clone())
        .run(&selection(&[1]))
        .await
        .unwrap();

    assert_eq!(
        first.calls(),
        vec![Invocation::DeployFactory {
            fee_to_setter: DEPLOYER
        }]
    );
    assert_eq!(report.address_of(ContractKind::UniswapV2Factory), Some(FACTORY));
    let recorded: Address =
        serde_json::from_value(ctx.registry_json()["polygonAmoy"]["UniswapV2Factory"].clone())
            .unwrap();
    assert_eq!(recorded, FACTORY);
    assert_eq!(ctx.registry_json().as_object().unwrap().len(), 1);

    // Second run: configure the factory, resolved from the registry.
    let before = std::fs::read(ctx.registry.path()).unwrap();
    let second = MockExecutor::default();
    let report = ctx
        .orchestrator(second.clone())
        .run(&selection(&[2]))
        .await
        .unwrap();

    assert_eq!(
        second.calls(),
        vec![Invocation::ConfigureFactory {
            factory: FACTORY,
            fee_to: DEPLOYER
        }]
    );
    assert_eq!(
        report.steps[0].1,
        StepOutcome::Configured {
            target: FACTORY,
            tx_hash: Some(B256::repeat_byte(0x22))
        }
    );
    assert_eq!(std::fs::read(ctx.registry.path()).unwrap(), before);
}

#[tokio::test]
async fn test_in_run_address_wins_over_registry() {
    let store = DecoyStore::default();
    let executor = MockExecutor::default();

    let orchestrator = Orchestrator::new(store, executor.clone(), amoy(), DEPLOYER);
    orchestrator.run(&selection(&[1, 2, 3])).await.unwrap();

    assert_eq!(
        executor.calls(),
        vec![
            Invocation::DeployFactory {
                fee_to_setter: DEPLOYER
            },
            Invocation::ConfigureFactory {
                factory: FACTORY,
                fee_to: DEPLOYER
            },
            Invocation::DeployRouter {
                factory: FACTORY,
                wrapped_native: AMOY_WPOL
            },
        ]
    );
    assert!(orchestrator.store().gets.lock().unwrap().is_empty());
    assert_eq!(
        *orchestrator.store().sets.lock().unwrap(),
        vec![
            ("UniswapV2Factory".to_string(), FACTORY),
            ("FairSwapRouter".to_string(), ROUTER)
        ]
    );
}

#[tokio::test]
async fn test_in_run_address_wins_over_stale_registry_file() {
    let ctx = TestContext::new();
    ctx.registry.set("polygonAmoy", "UniswapV2Factory", DECOY).unwrap();

    let executor = MockExecutor::default();
    ctx.orchestrator(executor.clone())
        .run(&selection(&[1, 2]))
        .await
        .unwrap();

    assert_eq!(
        executor.calls()[1],
        Invocation::ConfigureFactory {
            factory: FACTORY,
            fee_to: DEPLOYER
        }
    );
    assert_eq!(ctx.registry.get("polygonAmoy", "UniswapV2Factory").unwrap(), FACTORY);
}

#[tokio::test]
async fn test_abort_on_failure() {
    let ctx = TestContext::new();
    let executor = MockExecutor::failing_on(StepId::DeployFactory);

    let err = ctx
        .orchestrator(executor.clone())
        .run(&selection(&[1, 2]))
        .await
        .expect_err("step 1 should fail");

    assert!(matches!(
        err,
        DeployError::ExecutionFailed {
            step: StepId::DeployFactory,
            ..
        }
    ));
    assert_eq!(err.step(), Some(StepId::DeployFactory));
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(ctx.registry_json(), serde_json::json!({ "polygonAmoy": {} }));
}

#[tokio::test]
async fn test_completed_steps_survive_a_later_failure() {
    let ctx = TestContext::new();
    let executor = MockExecutor::failing_on(StepId::ConfigureFactory);

    let err = ctx
        .orchestrator(executor)
        .run(&selection(&[1, 2, 3]))
        .await
        .expect_err("step 2 should fail");

    assert_eq!(err.step(), Some(StepId::ConfigureFactory));
    assert_eq!(ctx.registry.get("polygonAmoy", "UniswapV2Factory").unwrap(), FACTORY);
    assert!(ctx.registry.get("polygonAmoy", "FairSwapRouter").is_err());

    // Resume with the remaining steps.
    let resumed = MockExecutor::default();
    ctx.orchestrator(resumed.clone())
        .run(&selection(&[2, 3]))
        .await
        .unwrap();

    assert_eq!(resumed.calls().len(), 2);
    assert_eq!(ctx.registry.get("polygonAmoy", "FairSwapRouter").unwrap(), ROUTER);
}

#[tokio::test]
async fn test_missing_factory_is_unresolved_dependency() {
    let ctx = TestContext::new();
    let executor = MockExecutor::default();

    let err = ctx
        .orchestrator(executor.clone())
        .run(&selection(&[2]))
        .await
        .expect_err("factory was never deployed");

    match err {
        DeployError::UnresolvedDependency { step, input } => {
            assert_eq!(step, StepId::ConfigureFactory);
            assert_eq!(input, "UniswapV2Factory");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_router_on_unsupported_chain() {
    let ctx = TestContext::new();
    ctx.registry.set("localhost", "UniswapV2Factory", FACTORY).unwrap();

    let executor = MockExecutor::default();
    let err = Orchestrator::new(
        ctx.registry.clone(),
        executor.clone(),
        Network::new("localhost", 31337),
        DEPLOYER,
    )
    .run(&selection(&[3]))
    .await
    .expect_err("no wrapped native token on a local chain");

    assert_eq!(err.step(), Some(StepId::DeployRouter));
    assert!(matches!(err.cause(), DeployError::UnsupportedChain(31337)));
    assert!(executor.calls().is_empty());
}

/// Store that cannot persist, or cannot be read back.
struct BrokenStore {
    path: PathBuf,
    unreadable: bool,
}

impl BrokenStore {
    fn unwritable() -> Self {
        Self {
            path: PathBuf::from("deployment.json"),
            unreadable: false,
        }
    }

    fn unreadable() -> Self {
        Self {
            path: PathBuf::from("deployment.json"),
            unreadable: true,
        }
    }
}

impl AddressStore for BrokenStore {
    type Guard = ();

    fn acquire(&self) -> Result<(), DeployError> {
        Ok(())
    }

    fn ensure_store(&self, _network: &str) -> Result<(), DeployError> {
        Ok(())
    }

    fn get(&self, network: &str, contract: &str) -> Result<Address, DeployError> {
        if self.unreadable {
            return Err(DeployError::StoreInitFailed {
                path: self.path.clone(),
                source: anyhow::anyhow!("permission denied"),
            });
        }

        Err(DeployError::NotFound {
            network: network.to_string(),
            contract: contract.to_string(),
        })
    }

    fn set(&self, _network: &str, _contract: &str, _address: Address) -> Result<(), DeployError> {
        Err(DeployError::StoreWriteFailed {
            path: self.path.clone(),
            source: anyhow::anyhow!("no space left on device"),
        })
    }
}

#[tokio::test]
async fn test_unrecorded_deployment_aborts_run() {
    let executor = MockExecutor::default();

    let err = Orchestrator::new(BrokenStore::unwritable(), executor.clone(), amoy(), DEPLOYER)
        .run(&selection(&[1, 2]))
        .await
        .expect_err("factory address could not be recorded");

    assert_eq!(err.step(), Some(StepId::DeployFactory));
    assert!(matches!(err.cause(), DeployError::StoreWriteFailed { .. }));
    assert_eq!(
        executor.calls(),
        vec![Invocation::DeployFactory {
            fee_to_setter: DEPLOYER
        }]
    );
}

#[tokio::test]
async fn test_unreadable_registry_fails_step_with_its_id() {
    let executor = MockExecutor::default();

    let err = Orchestrator::new(BrokenStore::unreadable(), executor.clone(), amoy(), DEPLOYER)
        .run(&selection(&[2]))
        .await
        .expect_err("factory address could not be read");

    assert_eq!(err.step(), Some(StepId::ConfigureFactory));
    assert!(matches!(err.cause(), DeployError::StoreInitFailed { .. }));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_skip_deployed_reuses_recorded_factory() {
    let ctx = TestContext::new();
    ctx.registry.set("polygonAmoy", "UniswapV2Factory", DECOY).unwrap();

    let executor = MockExecutor::default();
    let fee_to = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
    let report = ctx
        .orchestrator(executor.clone())
        .skip_deployed(true)
        .fee_to(fee_to)
        .run(&selection(&[1, 2]))
        .await
        .unwrap();

    assert_eq!(
        executor.calls(),
        vec![Invocation::ConfigureFactory {
            factory: DECOY,
            fee_to
        }]
    );
    assert_eq!(
        report.steps[0].1,
        StepOutcome::AlreadyDeployed {
            contract: ContractKind::UniswapV2Factory,
            address: DECOY
        }
    );
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let ctx = TestContext::new();
    let _guard = ctx.registry.acquire().unwrap();

    let executor = MockExecutor::default();
    let err = ctx
        .orchestrator(executor.clone())
        .run(&selection(&[1]))
        .await
        .expect_err("registry is held by another run");

    assert!(matches!(err, DeployError::StoreLocked { .. }));
    assert!(executor.calls().is_empty());
}

/// Chain client answering from canned state.
struct MockChain {
    network: Network,
    fee_to: Address,
    revert: bool,
    sent: Mutex<Vec<(Option<Address>, Bytes)>>,
}

impl MockChain {
    fn new(fee_to: Address) -> Self {
        Self {
            network: amoy(),
            fee_to,
            revert: false,
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl ChainClient for MockChain {
    fn network(&self) -> &Network {
        &self.network
    }

    fn sender(&self) -> Address {
        DEPLOYER
    }

    async fn balance(&self) -> Result<U256> {
        Ok(U256::from(10u64).pow(U256::from(18u64)))
    }

    async fn deploy(&self, init_code: Bytes, constructor_args: Bytes) -> Result<PendingTx> {
        let data = [init_code.as_ref(), constructor_args.as_ref()].concat();
        self.sent.lock().unwrap().push((None, data.into()));
        Ok(PendingTx {
            tx_hash: B256::repeat_byte(0x01),
        })
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<PendingTx> {
        self.sent.lock().unwrap().push((Some(to), calldata));
        Ok(PendingTx {
            tx_hash: B256::repeat_byte(0x02),
        })
    }

    async fn read(&self, _to: Address, _calldata: Bytes) -> Result<Bytes> {
        Ok(self.fee_to.into_word().to_vec().into())
    }

    async fn confirm(&self, pending: PendingTx) -> Result<Receipt> {
        let is_deploy = pending.tx_hash == B256::repeat_byte(0x01);
        Ok(Receipt {
            tx_hash: pending.tx_hash,
            block_number: 7,
            success: !self.revert,
            contract_address: is_deploy.then_some(FACTORY),
        })
    }
}

fn write_artifact(dir: &TempDir, name: &str) -> ArtifactStore {
    let path = dir.path().join(format!("contracts/{name}.sol"));
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(
        path.join(format!("{name}.json")),
        format!(
            r#"{{ "contractName": "{name}", "sourceName": "contracts/{name}.sol", "bytecode": "0x60806040" }}"#
        ),
    )
    .unwrap();
    ArtifactStore::new(dir.path())
}

#[tokio::test]
async fn test_chain_executor_deploys_factory_with_constructor_args() {
    let dir = TempDir::new("fairswap-artifacts").unwrap();
    let artifacts = write_artifact(&dir, "UniswapV2Factory");
    let executor = ChainStepExecutor::new(MockChain::new(Address::ZERO), artifacts);

    let address = executor.deploy_factory(DEPLOYER).await.unwrap();

    assert_eq!(address, FACTORY);
    let sent = executor.client().sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let (to, data) = &sent[0];
    assert_eq!(*to, None);
    assert_eq!(&data[..4], &[0x60, 0x80, 0x60, 0x40]);
    assert_eq!(&data[4..], DEPLOYER.into_word().as_slice());
}

#[tokio::test]
async fn test_chain_executor_skips_matching_fee_recipient() {
    let dir = TempDir::new("fairswap-artifacts").unwrap();
    let executor = ChainStepExecutor::new(MockChain::new(DEPLOYER), ArtifactStore::new(dir.path()));

    let tx_hash = executor.configure_factory(FACTORY, DEPLOYER).await.unwrap();

    assert_eq!(tx_hash, None);
    assert!(executor.client().sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chain_executor_sets_fee_recipient() {
    let dir = TempDir::new("fairswap-artifacts").unwrap();
    let executor =
        ChainStepExecutor::new(MockChain::new(Address::ZERO), ArtifactStore::new(dir.path()));

    let tx_hash = executor.configure_factory(FACTORY, DEPLOYER).await.unwrap();

    assert_eq!(tx_hash, Some(B256::repeat_byte(0x02)));
    let sent = executor.client().sent.lock().unwrap().clone();
    assert_eq!(sent[0].0, Some(FACTORY));
    assert_eq!(hex::encode(&sent[0].1[..4]), "f46901ed");
}

#[tokio::test]
async fn test_chain_executor_fails_on_revert() {
    let dir = TempDir::new("fairswap-artifacts").unwrap();
    let artifacts = write_artifact(&dir, "UniswapV2Factory");
    let mut chain = MockChain::new(Address::ZERO);
    chain.revert = true;

    let err = ChainStepExecutor::new(chain, artifacts)
        .deploy_factory(DEPLOYER)
        .await
        .expect_err("reverted deployment");

    assert!(err.to_string().contains("reverted"));
}

#[tokio::test]
async fn test_chain_executor_fails_without_artifact() {
    let dir = TempDir::new("fairswap-artifacts").unwrap();
    let executor =
        ChainStepExecutor::new(MockChain::new(Address::ZERO), ArtifactStore::new(dir.path()));

    assert!(executor.deploy_router(FACTORY, AMOY_WPOL).await.is_err());
    assert!(executor.client().sent.lock().unwrap().is_empty());
}

/// Verifier that rejects the router.
#[derive(Default)]
struct MockVerifier {
    requests: Mutex<Vec<VerificationRequest>>,
}

impl Verifier for MockVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if request.contract == ContractKind::FairSwapRouter {
            anyhow::bail!("Fail - Unable to verify");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_verify_all_collects_failures() {
    let ctx = TestContext::new();
    ctx.registry.set("polygonAmoy", "UniswapV2Factory", FACTORY).unwrap();
    ctx.registry.set("polygonAmoy", "FairSwapRouter", ROUTER).unwrap();

    let verifier = MockVerifier::default();
    let report = verify_all(&verifier, &ctx.registry, &amoy(), DEPLOYER)
        .await
        .unwrap();

    assert_eq!(report.verified, vec![ContractKind::UniswapV2Factory]);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_success());

    let requests = verifier.requests.lock().unwrap();
    assert_eq!(requests[0].constructor_args.as_ref(), DEPLOYER.into_word().as_slice());
    let router_args = &requests[1].constructor_args;
    assert_eq!(&router_args[..32], FACTORY.into_word().as_slice());
    assert_eq!(&router_args[32..], AMOY_WPOL.into_word().as_slice());
}

#[tokio::test]
async fn test_verify_all_uses_given_fee_to_setter() {
    let ctx = TestContext::new();
    ctx.registry.set("polygonAmoy", "UniswapV2Factory", FACTORY).unwrap();
    let original_deployer = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");

    let verifier = MockVerifier::default();
    let report = verify_all(&verifier, &ctx.registry, &amoy(), original_deployer)
        .await
        .unwrap();

    assert!(report.is_success());
    let requests = verifier.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].constructor_args.as_ref(),
        original_deployer.into_word().as_slice()
    );
}

//! End-to-end workflow tests for vaultkit-deploy.
//!
//! Every workflow runs against the in-memory `SimulatedChain`, so these tests need no node.
//! Run with: cargo test --test workflows

use alloy_core::primitives::{Address, Bytes, U256, address};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use vaultkit_deploy::{
    BalanceSeeder, ChainClient, ChainError, ContractKind, ContractView, DeployConfig,
    DeploymentRecord, ErrorKind, Orchestrator, OrchestratorError, PendingTx, REWARDS_TOKEN,
    Receipt, Recipient, SimulatedChain, SimulatedOperation, Step, TokenDeployer, TokenMetadata,
    TokenRole, UpgradeVerifier, VAULT, VAULT_TOKEN, VaultConfig, VaultDeployer, VaultSettings,
    Workflow, WorkflowReport,
    chain::deploy_proxy,
    contracts::{IVault, IVaultToken, VaultParams},
    units::parse_token_amount,
};

const ADMIN: Address = address!("5aF828D07f4e403522F2E88eC544E1F7D559E29d");
const PINNED_TOKEN: Address = address!("0372c5F3e23AD56AF9694462300c92632b6ee326");
const PINNED_REWARDS: Address = address!("e6eE5106E269D9a5d8d0E5EF4f78f39c3fcDA7f8");
const PINNED_VAULT: Address = address!("cE64490008587c092ACb0f804491d2b19B482A1D");

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Default configuration with the three historical deployment addresses pinned.
fn pinned_config() -> DeployConfig {
    let mut config = DeployConfig::default();
    config
        .address_book
        .pin(VAULT_TOKEN, PINNED_TOKEN)
        .pin(REWARDS_TOKEN, PINNED_REWARDS)
        .pin(VAULT, PINNED_VAULT);
    config
}

fn default_supply() -> U256 {
    U256::from(10_000_000_000_000u64) * U256::from(10u64).pow(U256::from(18))
}

/// Simulated chain on which every view call with `selector` reverts.
struct FailingView {
    chain: SimulatedChain,
    selector: [u8; 4],
}

impl ChainClient for FailingView {
    fn sender(&self) -> Address {
        self.chain.sender()
    }

    async fn create_proxy_instance(
        &self,
        kind: ContractKind,
    ) -> std::result::Result<PendingTx, ChainError> {
        self.chain.create_proxy_instance(kind).await
    }

    async fn call_initializer(
        &self,
        proxy: Address,
        calldata: Bytes,
    ) -> std::result::Result<PendingTx, ChainError> {
        self.chain.call_initializer(proxy, calldata).await
    }

    async fn upgrade_implementation(
        &self,
        proxy: Address,
        new_kind: ContractKind,
    ) -> std::result::Result<PendingTx, ChainError> {
        self.chain.upgrade_implementation(proxy, new_kind).await
    }

    async fn call(&self, to: Address, calldata: Bytes) -> std::result::Result<Bytes, ChainError> {
        if calldata.starts_with(&self.selector) {
            return Err(ChainError::CallReverted {
                to,
                reason: "execution reverted".to_string(),
            });
        }
        self.chain.call(to, calldata).await
    }

    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> std::result::Result<PendingTx, ChainError> {
        self.chain.send_transaction(to, calldata).await
    }

    async fn await_confirmation(
        &self,
        tx: PendingTx,
    ) -> std::result::Result<Receipt, ChainError> {
        self.chain.await_confirmation(tx).await
    }
}

/// Run `workflow` and check the confirmed steps against its plan: all of them when done,
/// otherwise a prefix followed by the failing step.
async fn run_checked<C: ChainClient>(
    orchestrator: &Orchestrator<C>,
    workflow: Workflow,
) -> WorkflowReport {
    let planned = workflow.steps(orchestrator.config().seed_admin_balances);
    let report = orchestrator.run(workflow).await;

    let confirmed: Vec<Step> = report.steps.iter().map(|record| record.step).collect();
    match report.failure() {
        None => assert_eq!(confirmed, planned),
        Some((failed, _)) => {
            assert!(confirmed.len() < planned.len(), "aborted run confirmed every step");
            assert_eq!(confirmed[..], planned[..confirmed.len()]);
            assert_eq!(*failed, planned[confirmed.len()]);
        }
    }
    report
}

#[tokio::test]
async fn test_deploy_token_and_vault_seeds_vault() -> Result<()> {
    init_test_tracing();

    let config = DeployConfig::default();
    let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);

    let report = run_checked(&orchestrator, Workflow::DeployTokenAndVault).await;
    assert!(report.is_done(), "workflow should be done: {report}");

    let steps: Vec<Step> = report.steps.iter().map(|record| record.step).collect();
    assert_eq!(steps, Workflow::DeployTokenAndVault.steps(false));

    let vault = report.vault.as_ref().context("vault should be deployed")?;
    let rewards = &report.tokens[1];
    assert_eq!(rewards.symbol, "yVT");

    let chain = orchestrator.client();
    assert_eq!(chain.balance_of(rewards.address, vault.address), default_supply());
    assert_eq!(chain.balance_of(report.tokens[0].address, ADMIN), U256::ZERO);

    let (token, rewards_token) = VaultDeployer::new(chain)
        .read_token_addresses(vault.address)
        .await?;
    assert_eq!(token, report.tokens[0].address);
    assert_eq!(rewards_token, rewards.address);
    Ok(())
}

#[tokio::test]
async fn test_deploy_token_and_vault_with_admin_seeds() -> Result<()> {
    init_test_tracing();

    let mut config = DeployConfig::default();
    config.seed_admin_balances = true;
    config.balances.vault_token = "1_000".to_string();
    let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);

    let report = run_checked(&orchestrator, Workflow::DeployTokenAndVault).await;
    assert!(report.is_done(), "workflow should be done: {report}");
    assert_eq!(report.steps.len(), 7);
    assert_eq!(
        report.steps[2].step,
        Step::Seed {
            token: TokenRole::Primary,
            recipient: Recipient::Admin
        }
    );

    let chain = orchestrator.client();
    let primary = report.tokens[0].address;
    let rewards = report.tokens[1].address;
    assert_eq!(chain.balance_of(primary, ADMIN), parse_token_amount("1000")?);
    assert_eq!(chain.balance_of(rewards, ADMIN), default_supply());
    assert_eq!(report.mints.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_deploy_token_profiles() -> Result<()> {
    init_test_tracing();

    let mut config = DeployConfig::default();
    config.balances.vault_rewards = "2.5".to_string();
    let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);

    let report = run_checked(&orchestrator, Workflow::DeployToken {
            role: TokenRole::Rewards,
            metadata: None,
        })
        .await;
    assert!(report.is_done(), "workflow should be done: {report}");
    let token = &report.tokens[0];
    assert_eq!(token.name, "yVaultToken");
    assert_eq!(
        orchestrator.client().balance_of(token.address, ADMIN),
        parse_token_amount("2.5")?
    );

    let report = run_checked(&orchestrator, Workflow::DeployToken {
            role: TokenRole::Primary,
            metadata: Some(TokenMetadata::new("Staked Vault", "sVLT")),
        })
        .await;
    assert!(report.is_done(), "workflow should be done: {report}");
    assert_eq!(report.tokens[0].symbol, "sVLT");
    Ok(())
}

#[tokio::test]
async fn test_deployed_token_echoes_name_and_symbol() -> Result<()> {
    let chain = SimulatedChain::new(ADMIN);
    let deployer = TokenDeployer::new(&chain);

    for (name, symbol) in [
        ("VaultToken", "VT"),
        ("yVaultToken", "yVT"),
        ("Ünïcode Token", "ÜT"),
        ("A token with a rather long descriptive name", "LONG"),
    ] {
        let token = deployer.deploy_token(name, symbol).await?;
        let attached = deployer.attach_token(token.address).await?;
        assert_eq!(attached.name, name);
        assert_eq!(attached.symbol, symbol);
    }
    Ok(())
}

#[tokio::test]
async fn test_minting_twice_doubles_balance() -> Result<()> {
    let chain = SimulatedChain::new(ADMIN);
    let token = TokenDeployer::new(&chain)
        .deploy_token("VaultToken", "VT")
        .await?;
    let seeder = BalanceSeeder::new(&chain);
    let amount = parse_token_amount("10000000000000")?;

    let first = seeder.mint(token.address, ADMIN, amount).await?;
    assert_eq!(first.balance, Some(amount));

    let second = seeder.mint(token.address, ADMIN, amount).await?;
    assert_eq!(second.balance, Some(amount * U256::from(2)));
    Ok(())
}

#[tokio::test]
async fn test_mint_revert_aborts_at_seed() -> Result<()> {
    init_test_tracing();

    let config = DeployConfig::default();
    let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);
    orchestrator
        .client()
        .fail_next(SimulatedOperation::Mint, "caller lacks mint role");

    let report = run_checked(&orchestrator, Workflow::DeployTokenAndVault).await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(
        *step,
        Step::Seed {
            token: TokenRole::Rewards,
            recipient: Recipient::Vault
        }
    );
    assert_eq!(error.kind(), ErrorKind::MintFailure);
    assert!(error.to_string().contains("caller lacks mint role"));

    // The vault deployment confirmed before the failure stays on chain.
    let vault = report.vault.as_ref().context("vault should be recorded")?;
    let chain = orchestrator.client();
    assert_eq!(
        chain.implementation_of(vault.address),
        Some(ContractKind::Vault)
    );
    assert_eq!(
        chain.balance_of(report.tokens[1].address, vault.address),
        U256::ZERO
    );
    assert_eq!(
        chain.history().last().map(|(op, _)| *op),
        Some(SimulatedOperation::Mint)
    );
    assert!(report.mints.is_empty());

    let record = DeploymentRecord::from_report(&report);
    assert_eq!(record.outcome, "aborted at seed(rewards -> vault)");
    assert_eq!(record.addresses.get(VAULT), Some(&vault.address));
    Ok(())
}

#[tokio::test]
async fn test_deploy_vault_against_existing_tokens() -> Result<()> {
    init_test_tracing();

    let config = pinned_config();
    let chain = SimulatedChain::with_pins(&config);
    let orchestrator = Orchestrator::new(chain, config);

    let report = run_checked(&orchestrator, Workflow::DeployVault).await;
    assert!(report.is_done(), "workflow should be done: {report}");

    let vault = report.vault.as_ref().context("vault should be deployed")?;
    assert_ne!(vault.address, PINNED_VAULT);
    let vault_config = vault.config.as_ref().context("vault config should be known")?;
    assert_eq!(vault_config.token, PINNED_TOKEN);
    assert_eq!(vault_config.rewards_token, PINNED_REWARDS);

    assert_eq!(report.tokens.len(), 1);
    assert_eq!(report.tokens[0].address, PINNED_REWARDS);
    assert_eq!(
        orchestrator.client().balance_of(PINNED_REWARDS, vault.address),
        default_supply()
    );
    Ok(())
}

#[tokio::test]
async fn test_deploy_vault_requires_pins() -> Result<()> {
    let mut config = DeployConfig::default();
    config.address_book.pin(VAULT_TOKEN, PINNED_TOKEN);
    let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);

    let report = run_checked(&orchestrator, Workflow::DeployVault).await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(*step, Step::Init);
    assert!(matches!(error, OrchestratorError::MissingPin(label) if label == REWARDS_TOKEN));
    assert!(orchestrator.client().history().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_deploy_vault_with_dead_rewards_pin() -> Result<()> {
    init_test_tracing();

    // The rewards pin points at an address where nothing is deployed.
    let config = pinned_config();
    let chain = SimulatedChain::new(config.admin);
    chain.pin_token(PINNED_TOKEN, "VaultToken", "VT");
    let orchestrator = Orchestrator::new(chain, config);

    let report = run_checked(&orchestrator, Workflow::DeployVault).await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(*step, Step::AttachExistingToken(TokenRole::Rewards));
    assert_eq!(error.kind(), ErrorKind::AttachFailure);

    let vault = report.vault.as_ref().context("vault should be recorded")?;
    assert_eq!(
        orchestrator.client().implementation_of(vault.address),
        Some(ContractKind::Vault)
    );
    Ok(())
}

#[tokio::test]
async fn test_upgrade_with_dead_vault_pin() -> Result<()> {
    init_test_tracing();

    // The vault pin points at an address where nothing is deployed.
    let config = pinned_config();
    let chain = SimulatedChain::new(config.admin);
    chain.pin_token(PINNED_TOKEN, "VaultToken", "VT");
    chain.pin_token(PINNED_REWARDS, "yVaultToken", "yVT");
    let orchestrator = Orchestrator::new(chain, config);

    let report = run_checked(&orchestrator, Workflow::UpgradeVault).await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(*step, Step::Init);
    assert_eq!(error.kind(), ErrorKind::AttachFailure);
    assert!(matches!(
        error,
        OrchestratorError::Attach { address, kind: ContractKind::Vault, .. } if *address == PINNED_VAULT
    ));
    assert!(report.steps.is_empty());
    assert!(orchestrator.client().history().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_upgrade_vault_in_place() -> Result<()> {
    init_test_tracing();

    let config = pinned_config();
    let chain = SimulatedChain::with_pins(&config);
    let orchestrator = Orchestrator::new(chain, config);
    assert_eq!(
        orchestrator.client().implementation_of(PINNED_VAULT),
        Some(ContractKind::Vault)
    );

    let report = run_checked(&orchestrator, Workflow::UpgradeVault).await;
    assert!(report.is_done(), "workflow should be done: {report}");

    let vault = report.vault.as_ref().context("vault should be upgraded")?;
    assert_eq!(vault.address, PINNED_VAULT);
    assert_eq!(vault.implementation_version, 2);
    assert_eq!(
        orchestrator.client().implementation_of(PINNED_VAULT),
        Some(ContractKind::VaultV2)
    );

    let verification = report
        .verification
        .as_ref()
        .context("verification should run")?;
    assert!(verification.matches);
    assert_eq!(verification.old_value, "yVaultToken");
    Ok(())
}

#[tokio::test]
async fn test_upgrade_reports_renamed_vault() -> Result<()> {
    init_test_tracing();

    let config = pinned_config();
    let chain = SimulatedChain::with_pins(&config);
    chain.rename_on_upgrade("yVaultToken V2");
    let orchestrator = Orchestrator::new(chain, config);

    let report = run_checked(&orchestrator, Workflow::UpgradeVault).await;
    // A mismatch is advisory: the run still completes.
    assert!(report.is_done(), "workflow should be done: {report}");

    let verification = report
        .verification
        .as_ref()
        .context("verification should run")?;
    assert!(!verification.matches);
    assert!(verification.same_address);
    assert_eq!(verification.old_value, "yVaultToken");
    assert_eq!(verification.new_value, "yVaultToken V2");

    let verify = report
        .steps
        .iter()
        .find(|record| record.step == Step::Verify)
        .context("verify step should be recorded")?;
    assert_eq!(verify.detail, "name changed: yVaultToken -> yVaultToken V2");
    Ok(())
}

#[tokio::test]
async fn test_verifier_captures_both_values() -> Result<()> {
    let chain = SimulatedChain::new(ADMIN);
    let settings = VaultSettings::default();
    chain.pin_vault(
        PINNED_VAULT,
        VaultConfig::from_settings(PINNED_TOKEN, PINNED_REWARDS, &settings).initializer_args(),
    );
    chain.rename_on_upgrade("Renamed Vault");

    let verifier = UpgradeVerifier::new(&chain);
    let old_view = ContractView::new(PINNED_VAULT, ContractKind::Vault);
    let new_view = ContractView::new(PINNED_VAULT, ContractKind::VaultV2);

    let before = verifier.snapshot(old_view).await?;
    VaultDeployer::new(&chain).upgrade_vault(PINNED_VAULT).await?;

    let changed = verifier.verify_snapshot(&before, new_view).await?;
    assert!(!changed.matches);
    assert_eq!(changed.old_value, "yVaultToken");
    assert_eq!(changed.new_value, "Renamed Vault");

    // Read again through both views, the upgraded storage is consistent.
    let settled = verifier.verify(old_view, new_view).await?;
    assert!(settled.matches);
    Ok(())
}

#[tokio::test]
async fn test_upgrade_without_authority_keeps_implementation() -> Result<()> {
    init_test_tracing();

    let config = pinned_config();
    let chain = SimulatedChain::with_pins(&config);
    chain.set_sender(Address::repeat_byte(0x77));
    let orchestrator = Orchestrator::new(chain, config);

    let report = run_checked(&orchestrator, Workflow::UpgradeVault).await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(*step, Step::UpgradeVault);
    assert_eq!(error.kind(), ErrorKind::UpgradeFailure);
    assert!(report.verification.is_none());
    assert_eq!(
        orchestrator.client().implementation_of(PINNED_VAULT),
        Some(ContractKind::Vault)
    );
    Ok(())
}

#[tokio::test]
async fn test_misordered_initializer_is_detected() -> Result<()> {
    let chain = SimulatedChain::new(ADMIN);
    let tokens = TokenDeployer::new(&chain);
    let token = tokens.deploy_token("VaultToken", "VT").await?;
    let rewards = tokens.deploy_token("yVaultToken", "yVT").await?;

    let config =
        VaultConfig::from_settings(token.address, rewards.address, &VaultSettings::default());
    let ordered = config.initializer_args();

    // Token and rewards token swapped before encoding.
    let misordered = VaultParams {
        token: ordered.rewardsToken,
        rewardsToken: ordered.token,
        ..ordered
    };
    let calldata = IVault::initializeCall { params: misordered }.abi_encode();
    let vault = deploy_proxy(&chain, ContractKind::Vault, calldata.into()).await?;

    let err = VaultDeployer::new(&chain)
        .check_token_addresses(vault, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::PostDeployCheck { .. }));
    assert_eq!(err.kind(), ErrorKind::DeploymentFailure);
    Ok(())
}

#[tokio::test]
async fn test_mint_is_reported_when_balance_read_fails() -> Result<()> {
    init_test_tracing();

    let config = DeployConfig::default();
    let client = FailingView {
        chain: SimulatedChain::new(config.admin),
        selector: IVaultToken::balanceOfCall::SELECTOR,
    };
    let orchestrator = Orchestrator::new(client, config);

    let report = run_checked(
        &orchestrator,
        Workflow::DeployToken {
            role: TokenRole::Primary,
            metadata: None,
        },
    )
    .await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(
        *step,
        Step::Seed {
            token: TokenRole::Primary,
            recipient: Recipient::Admin
        }
    );
    assert_eq!(error.kind(), ErrorKind::ReadFailure);

    // The mint landed: it must show up in the report and the record.
    let token = report.tokens[0].address;
    assert_eq!(
        orchestrator.client().chain.balance_of(token, ADMIN),
        default_supply()
    );
    assert_eq!(report.mints.len(), 1);
    assert_eq!(report.mints[0].amount, default_supply());
    assert_eq!(report.mints[0].balance, None);

    let record = DeploymentRecord::from_report(&report);
    assert_eq!(record.mints, report.mints);
    assert_eq!(record.addresses.get(VAULT_TOKEN), Some(&token));
    Ok(())
}

#[tokio::test]
async fn test_vault_is_reported_when_readback_fails() -> Result<()> {
    init_test_tracing();

    let config = DeployConfig::default();
    let client = FailingView {
        chain: SimulatedChain::new(config.admin),
        selector: IVault::tokenCall::SELECTOR,
    };
    let orchestrator = Orchestrator::new(client, config);

    let report = run_checked(&orchestrator, Workflow::DeployTokenAndVault).await;
    let (step, error) = report.failure().context("workflow should abort")?;
    assert_eq!(*step, Step::DeployVault);
    assert_eq!(error.kind(), ErrorKind::ReadFailure);

    let vault = report.vault.as_ref().context("vault should be reported")?;
    assert_eq!(
        orchestrator.client().chain.implementation_of(vault.address),
        Some(ContractKind::Vault)
    );
    assert!(report.mints.is_empty());

    let record = DeploymentRecord::from_report(&report);
    assert_eq!(record.addresses.get(VAULT), Some(&vault.address));
    assert_eq!(record.addresses.len(), 3);
    Ok(())
}

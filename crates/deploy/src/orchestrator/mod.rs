//! The four deployment workflows.
//!
//! Each workflow is a fixed, linear sequence of [`Step`]s. Steps run one after the other and
//! every remote effect is confirmed before the next step starts. The first failing step aborts
//! the run; effects confirmed before it are left in place, there is no rollback.

mod report;

use std::fmt;

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    BalanceSeeder, ChainClient, ContractKind, ContractView, DeployConfig, OrchestratorError,
    REWARDS_TOKEN, Snapshot, TokenDeployer, TokenInstance, TokenMetadata, UpgradeVerifier, VAULT,
    VAULT_TOKEN, VaultConfig, VaultDeployer,
    units::{format_token_amount, parse_token_amount},
};

pub use report::{Outcome, StepRecord, WorkflowReport};

/// Which of the two token profiles a step works on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TokenRole {
    Primary,
    Rewards,
}

/// Who receives a seeded balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Recipient {
    /// The configured administrator.
    Admin,
    /// The vault deployed or upgraded in this run.
    Vault,
}

/// A workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Resolve pins, amounts and metadata. No remote call.
    Init,
    DeployToken(TokenRole),
    Seed { token: TokenRole, recipient: Recipient },
    DeployVault,
    AttachExistingToken(TokenRole),
    UpgradeVault,
    Verify,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Init => write!(f, "init"),
            Step::DeployToken(role) => write!(f, "deploy-token({role})"),
            Step::Seed { token, recipient } => write!(f, "seed({token} -> {recipient})"),
            Step::DeployVault => write!(f, "deploy-vault"),
            Step::AttachExistingToken(role) => write!(f, "attach-existing-token({role})"),
            Step::UpgradeVault => write!(f, "upgrade-vault"),
            Step::Verify => write!(f, "verify"),
        }
    }
}

/// The workflows an [`Orchestrator`] can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    /// Deploy one token and seed its supply to the admin.
    ///
    /// `metadata` overrides the name and symbol of the `role` profile.
    DeployToken {
        role: TokenRole,
        metadata: Option<TokenMetadata>,
    },
    /// Deploy both tokens and a vault referencing them, then seed the rewards supply to the
    /// vault.
    DeployTokenAndVault,
    /// Deploy a vault against the pinned tokens, then seed the rewards supply to it.
    DeployVault,
    /// Upgrade the pinned vault to the second implementation and compare its name before and
    /// after.
    UpgradeVault,
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Workflow::DeployToken { .. } => "deploy-token",
            Workflow::DeployTokenAndVault => "deploy-token-and-vault",
            Workflow::DeployVault => "deploy-vault",
            Workflow::UpgradeVault => "upgrade-vault",
        }
    }

    /// The steps this workflow goes through, in order.
    pub fn steps(&self, seed_admin_balances: bool) -> Vec<Step> {
        match self {
            Workflow::DeployToken { role, .. } => vec![
                Step::Init,
                Step::DeployToken(*role),
                Step::Seed {
                    token: *role,
                    recipient: Recipient::Admin,
                },
            ],
            Workflow::DeployTokenAndVault => {
                let mut steps = vec![Step::Init];
                for role in [TokenRole::Primary, TokenRole::Rewards] {
                    steps.push(Step::DeployToken(role));
                    if seed_admin_balances {
                        steps.push(Step::Seed {
                            token: role,
                            recipient: Recipient::Admin,
                        });
                    }
                }
                steps.extend([
                    Step::DeployVault,
                    Step::Seed {
                        token: TokenRole::Rewards,
                        recipient: Recipient::Vault,
                    },
                ]);
                steps
            }
            Workflow::DeployVault => vec![
                Step::Init,
                Step::DeployVault,
                Step::AttachExistingToken(TokenRole::Rewards),
                Step::Seed {
                    token: TokenRole::Rewards,
                    recipient: Recipient::Vault,
                },
            ],
            Workflow::UpgradeVault => vec![Step::Init, Step::UpgradeVault, Step::Verify],
        }
    }
}

/// Inputs of a run, resolved at [`Step::Init`].
#[derive(Debug)]
enum Plan {
    Token {
        role: TokenRole,
        metadata: TokenMetadata,
        supply: U256,
    },
    TokenAndVault {
        primary: TokenMetadata,
        rewards: TokenMetadata,
        primary_supply: U256,
        rewards_supply: U256,
    },
    VaultAgainstExisting {
        config: VaultConfig,
        rewards_supply: U256,
    },
    Upgrade {
        vault: Address,
        /// `name()` of the pinned vault before the upgrade.
        before: Snapshot,
    },
}

/// Progress of a run: what has been confirmed and which step is in flight.
struct Run {
    report: WorkflowReport,
    current: Step,
}

impl Run {
    fn begin(&mut self, step: Step) {
        self.current = step;
        tracing::info!(step = %step, "Running step");
    }

    fn confirm(&mut self, address: Option<Address>, detail: impl Into<String>) {
        self.report.record(self.current, address, detail);
    }
}

/// Runs workflows against a chain client with a fixed configuration.
pub struct Orchestrator<C> {
    client: C,
    config: DeployConfig,
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(client: C, config: DeployConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Run `workflow` to completion or to its first failing step.
    pub async fn run(&self, workflow: Workflow) -> WorkflowReport {
        let mut run = Run {
            report: WorkflowReport::new(workflow.name(), self.client.sender()),
            current: Step::Init,
        };

        tracing::info!(
            workflow = workflow.name(),
            sender = %self.client.sender(),
            steps = workflow.steps(self.config.seed_admin_balances).len(),
            "Starting workflow"
        );

        match self.execute(&workflow, &mut run).await {
            Ok(()) => {
                tracing::info!(workflow = workflow.name(), "Workflow done");
            }
            Err(error) => {
                tracing::error!(
                    workflow = workflow.name(),
                    step = %run.current,
                    kind = %error.kind(),
                    error = %error,
                    "Workflow aborted"
                );
                run.report.outcome = Outcome::Aborted {
                    step: run.current,
                    error,
                };
            }
        }
        run.report
    }

    async fn execute(&self, workflow: &Workflow, run: &mut Run) -> Result<(), OrchestratorError> {
        run.begin(Step::Init);
        let plan = self.init(workflow).await?;
        run.confirm(None, "configuration resolved");

        match plan {
            Plan::Token {
                role,
                metadata,
                supply,
            } => {
                let token = self.deploy_token(run, role, &metadata).await?;
                self.seed(run, role, &token, Recipient::Admin, supply)
                    .await?;
            }
            Plan::TokenAndVault {
                primary,
                rewards,
                primary_supply,
                rewards_supply,
            } => {
                let seed_admin = self.config.seed_admin_balances;

                let primary_token = self.deploy_token(run, TokenRole::Primary, &primary).await?;
                if seed_admin {
                    self.seed(
                        run,
                        TokenRole::Primary,
                        &primary_token,
                        Recipient::Admin,
                        primary_supply,
                    )
                    .await?;
                }

                let rewards_token = self.deploy_token(run, TokenRole::Rewards, &rewards).await?;
                if seed_admin {
                    self.seed(
                        run,
                        TokenRole::Rewards,
                        &rewards_token,
                        Recipient::Admin,
                        rewards_supply,
                    )
                    .await?;
                }

                let config = VaultConfig::from_settings(
                    primary_token.address,
                    rewards_token.address,
                    &self.config.vault,
                );
                self.deploy_vault(run, config).await?;
                self.seed(
                    run,
                    TokenRole::Rewards,
                    &rewards_token,
                    Recipient::Vault,
                    rewards_supply,
                )
                .await?;
            }
            Plan::VaultAgainstExisting {
                config,
                rewards_supply,
            } => {
                let rewards = config.rewards_token;
                self.deploy_vault(run, config).await?;

                run.begin(Step::AttachExistingToken(TokenRole::Rewards));
                let rewards_token = TokenDeployer::new(&self.client)
                    .attach_token(rewards)
                    .await?;
                run.confirm(
                    Some(rewards_token.address),
                    format!("{} ({})", rewards_token.name, rewards_token.symbol),
                );
                run.report.tokens.push(rewards_token.clone());

                self.seed(
                    run,
                    TokenRole::Rewards,
                    &rewards_token,
                    Recipient::Vault,
                    rewards_supply,
                )
                .await?;
            }
            Plan::Upgrade { vault, before } => {
                run.begin(Step::UpgradeVault);
                let upgraded = VaultDeployer::new(&self.client)
                    .upgrade_vault(vault)
                    .await?;
                run.confirm(
                    Some(upgraded.address),
                    format!("implementation version {}", upgraded.implementation_version),
                );
                let new_view = upgraded.view();
                run.report.vault = Some(upgraded);

                run.begin(Step::Verify);
                let verification = UpgradeVerifier::new(&self.client)
                    .verify_snapshot(&before, new_view)
                    .await?;
                run.confirm(
                    None,
                    if verification.matches {
                        format!("name preserved: {}", verification.new_value)
                    } else {
                        format!(
                            "name changed: {} -> {}",
                            verification.old_value, verification.new_value
                        )
                    },
                );
                run.report.verification = Some(verification);
            }
        }
        Ok(())
    }

    /// Validate the configuration and resolve every input of `workflow`.
    ///
    /// Only reads are sent: nothing lands on chain before this succeeds.
    async fn init(&self, workflow: &Workflow) -> Result<Plan, OrchestratorError> {
        let balances = &self.config.balances;

        let plan = match workflow {
            Workflow::DeployToken { role, metadata } => {
                let metadata = metadata.clone().unwrap_or_else(|| self.profile(*role).clone());
                metadata.validate()?;
                let supply = match role {
                    TokenRole::Primary => parse_token_amount(&balances.vault_token)?,
                    TokenRole::Rewards => parse_token_amount(&balances.vault_rewards)?,
                };
                Plan::Token {
                    role: *role,
                    metadata,
                    supply,
                }
            }
            Workflow::DeployTokenAndVault => {
                let primary = self.config.tokens.primary.clone();
                let rewards = self.config.tokens.rewards.clone();
                primary.validate()?;
                rewards.validate()?;
                self.config.vault.validate()?;
                Plan::TokenAndVault {
                    primary,
                    rewards,
                    primary_supply: parse_token_amount(&balances.vault_token)?,
                    rewards_supply: parse_token_amount(&balances.vault_rewards)?,
                }
            }
            Workflow::DeployVault => {
                let book = &self.config.address_book;
                // The primary token pin is used as is; only the rewards token gets attached.
                let token = book.pinned(VAULT_TOKEN)?;
                let rewards = book.pinned(REWARDS_TOKEN)?;
                let config =
                    VaultConfig::from_settings(token.address, rewards.address, &self.config.vault);
                config.validate()?;
                Plan::VaultAgainstExisting {
                    config,
                    rewards_supply: parse_token_amount(&balances.vault_rewards)?,
                }
            }
            Workflow::UpgradeVault => {
                let vault = self.config.address_book.pinned(VAULT)?.address;
                // Both interfaces reach the new code once the upgrade lands, so the old name is
                // captured now.
                let before = self.attach_vault(vault).await?;
                Plan::Upgrade { vault, before }
            }
        };

        tracing::debug!(?plan, "Workflow inputs resolved");
        Ok(plan)
    }

    /// Bind to the pinned vault through the first interface and capture its name.
    async fn attach_vault(&self, vault: Address) -> Result<Snapshot, OrchestratorError> {
        UpgradeVerifier::new(&self.client)
            .snapshot(ContractView::new(vault, ContractKind::Vault))
            .await
            .map_err(|error| match error {
                OrchestratorError::Read {
                    address, source, ..
                } => OrchestratorError::Attach {
                    address,
                    kind: ContractKind::Vault,
                    source,
                },
                other => other,
            })
    }

    fn profile(&self, role: TokenRole) -> &TokenMetadata {
        match role {
            TokenRole::Primary => &self.config.tokens.primary,
            TokenRole::Rewards => &self.config.tokens.rewards,
        }
    }

    async fn deploy_token(
        &self,
        run: &mut Run,
        role: TokenRole,
        metadata: &TokenMetadata,
    ) -> Result<TokenInstance, OrchestratorError> {
        run.begin(Step::DeployToken(role));
        let token = TokenDeployer::new(&self.client)
            .deploy_token(&metadata.name, &metadata.symbol)
            .await?;
        run.confirm(
            Some(token.address),
            format!("{} ({})", token.name, token.symbol),
        );
        run.report.tokens.push(token.clone());
        Ok(token)
    }

    async fn deploy_vault(
        &self,
        run: &mut Run,
        config: VaultConfig,
    ) -> Result<(), OrchestratorError> {
        run.begin(Step::DeployVault);
        let deployer = VaultDeployer::new(&self.client);
        let vault = deployer.create_vault(config).await?;
        let (address, version) = (vault.address, vault.implementation_version);
        let config = vault.config.clone();
        // Reported even if the readback below fails: the proxy is on chain.
        run.report.vault = Some(vault);

        if let Some(config) = &config {
            deployer.check_token_addresses(address, config).await?;
        }
        run.confirm(Some(address), format!("implementation version {version}"));
        Ok(())
    }

    /// Mint `amount` of the `role` token to `recipient`.
    async fn seed(
        &self,
        run: &mut Run,
        role: TokenRole,
        token: &TokenInstance,
        recipient: Recipient,
        amount: U256,
    ) -> Result<(), OrchestratorError> {
        run.begin(Step::Seed {
            token: role,
            recipient,
        });
        let to = match recipient {
            Recipient::Admin => self.config.admin,
            Recipient::Vault => run
                .report
                .vault
                .as_ref()
                .map(|vault| vault.address)
                .ok_or_else(|| {
                    OrchestratorError::InvalidConfig("no vault to seed in this run".to_string())
                })?,
        };

        let seeder = BalanceSeeder::new(&self.client);
        let mut mint = seeder.send_mint(token.address, to, amount).await?;
        let balance = seeder.read_balance(&mut mint).await;
        // The mint is confirmed on chain whether or not its balance could be read back.
        run.report.mints.push(mint);
        balance?;

        run.confirm(
            Some(token.address),
            format!("{} {} to {to}", format_token_amount(amount), token.symbol),
        );
        Ok(())
    }
}

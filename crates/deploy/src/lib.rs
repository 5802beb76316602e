//! vaultkit-deploy - Deployment library for proxied vault and token contracts.
//!
//! This crate deploys upgradeable token and vault instances, seeds initial balances and upgrades
//! vaults in place. Every remote operation goes through a [`ChainClient`], either the JSON-RPC
//! backed [`RpcChainClient`] or the in-memory [`SimulatedChain`].
//!
//! # Example
//!
//! ```no_run
//! use vaultkit_deploy::{DeployConfig, Orchestrator, SimulatedChain, TokenRole, Workflow};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = DeployConfig::load_from_file(&"Vaultkit.toml".into())?;
//! let chain = SimulatedChain::new(config.admin);
//! let report = Orchestrator::new(chain, config)
//!     .run(Workflow::DeployToken { role: TokenRole::Primary, metadata: None })
//!     .await;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod address_book;
pub mod chain;
mod config;
pub mod contracts;
mod deployments;
mod error;
mod orchestrator;
mod seeder;
mod token;
pub mod units;
mod vault;
mod verifier;

pub use address_book::{AddressBook, AddressBookEntry, REWARDS_TOKEN, VAULT, VAULT_TOKEN};
pub use chain::{
    Artifacts, ArtifactsConfig, ChainClient, ChainError, PendingTx, Receipt, RpcChainClient, RpcConfig,
    SimulatedChain, SimulatedOperation,
};
pub use config::{
    CONFIG_FILENAME, DEFAULT_ADMIN, DEFAULT_INITIAL_SUPPLY, DeployConfig, InitialBalances, TokenMetadata,
    TokenProfiles, VaultSettings,
};
pub use contracts::{ContractKind, ContractView};
pub use deployments::{DEPLOYMENTS_FILENAME, DeploymentRecord};
pub use error::{ErrorKind, OrchestratorError};
pub use orchestrator::{
    Orchestrator, Outcome, Recipient, Step, StepRecord, TokenRole, Workflow, WorkflowReport,
};
pub use seeder::{BalanceSeeder, MintRecord};
pub use token::{TOKEN_IMPLEMENTATION_VERSION, TokenDeployer, TokenInstance};
pub use vault::{VaultConfig, VaultDeployer, VaultInstance};
pub use verifier::{Snapshot, UpgradeVerifier, VerificationReport};

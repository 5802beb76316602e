//! Errors raised while running a deployment workflow.

use alloy_core::primitives::{Address, U256};

use crate::{ChainError, ContractKind};

/// Coarse classification of an [`OrchestratorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    DeploymentFailure,
    MintFailure,
    UpgradeFailure,
    AttachFailure,
    ReadFailure,
    Configuration,
}

/// Errors that stop a workflow.
///
/// None of them are retried. A workflow that hits one transitions to
/// [`crate::Outcome::Aborted`] and leaves every already confirmed on-chain effect in place.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Proxy creation or the initializer call was rejected.
    #[error("failed to deploy {kind} proxy: {source}")]
    Deployment {
        kind: ContractKind,
        #[source]
        source: ChainError,
    },
    /// The freshly deployed instance does not report what it was initialized with.
    #[error("post-deploy check failed for {address}: {reason}")]
    PostDeployCheck { address: Address, reason: String },
    /// The mint transaction reverted.
    #[error("failed to mint {amount} base units of {token} to {recipient}: {source}")]
    Mint {
        token: Address,
        recipient: Address,
        amount: U256,
        #[source]
        source: ChainError,
    },
    /// The upgrade transaction reverted or was refused by the upgrade mechanism.
    #[error("failed to upgrade {proxy} to {kind}: {source}")]
    Upgrade {
        proxy: Address,
        kind: ContractKind,
        #[source]
        source: ChainError,
    },
    /// A pinned address does not expose the expected interface.
    #[error("{address} does not expose the {kind} interface: {source}")]
    Attach {
        address: Address,
        kind: ContractKind,
        #[source]
        source: ChainError,
    },
    /// A view call failed.
    #[error("failed to read {field} from {address}: {source}")]
    Read {
        address: Address,
        field: &'static str,
        #[source]
        source: ChainError,
    },
    #[error("address book has no entry for `{0}`")]
    MissingPin(String),
    #[error("invalid vault configuration: {0}")]
    InvalidVaultConfig(String),
    #[error("invalid token amount `{amount}`: {reason}")]
    InvalidAmount { amount: String, reason: String },
    #[error("token name and symbol must not be empty")]
    InvalidTokenMetadata,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Deployment { .. } | OrchestratorError::PostDeployCheck { .. } => {
                ErrorKind::DeploymentFailure
            }
            OrchestratorError::Mint { .. } => ErrorKind::MintFailure,
            OrchestratorError::Upgrade { .. } => ErrorKind::UpgradeFailure,
            OrchestratorError::Attach { .. } => ErrorKind::AttachFailure,
            OrchestratorError::Read { .. } => ErrorKind::ReadFailure,
            OrchestratorError::MissingPin(_)
            | OrchestratorError::InvalidVaultConfig(_)
            | OrchestratorError::InvalidAmount { .. }
            | OrchestratorError::InvalidTokenMetadata
            | OrchestratorError::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }
}

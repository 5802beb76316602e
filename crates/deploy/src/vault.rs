//! Vault deployment and in-place upgrades.

use alloy_core::primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::{
    ChainClient, ContractKind, ContractView, OrchestratorError, VaultSettings,
    chain::{deploy_proxy, read},
    contracts::{IVault, VaultParams},
};

/// Everything a vault is initialized with.
///
/// The initializer takes these fields positionally; [`VaultConfig::initializer_args`] is the
/// only place that maps them to their on-chain order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub token: Address,
    pub rewards_token: Address,
    pub name: String,
    pub symbol: String,
    pub flag_a: bool,
    pub flag_b: bool,
    pub param_x: U256,
    pub param_y: U256,
}

impl VaultConfig {
    /// Combine the two token addresses with the configured scalars.
    pub fn from_settings(token: Address, rewards_token: Address, settings: &VaultSettings) -> Self {
        Self {
            token,
            rewards_token,
            name: settings.name.clone(),
            symbol: settings.symbol.clone(),
            flag_a: settings.flag_a,
            flag_b: settings.flag_b,
            param_x: U256::from(settings.param_x),
            param_y: U256::from(settings.param_y),
        }
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.token.is_zero() {
            return Err(OrchestratorError::InvalidVaultConfig(
                "token address is zero".to_string(),
            ));
        }
        if self.rewards_token.is_zero() {
            return Err(OrchestratorError::InvalidVaultConfig(
                "rewards token address is zero".to_string(),
            ));
        }
        if self.token == self.rewards_token {
            return Err(OrchestratorError::InvalidVaultConfig(format!(
                "token and rewards token are both {}",
                self.token
            )));
        }
        if self.name.trim().is_empty() || self.symbol.trim().is_empty() {
            return Err(OrchestratorError::InvalidVaultConfig(
                "name and symbol must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The initializer argument, fields in the order the vault expects them:
    /// token, rewards token, name, symbol, flag A, flag B, param X, param Y.
    pub fn initializer_args(&self) -> VaultParams {
        VaultParams {
            token: self.token,
            rewardsToken: self.rewards_token,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            flagA: self.flag_a,
            flagB: self.flag_b,
            paramX: self.param_x,
            paramY: self.param_y,
        }
    }

    fn initializer_calldata(&self) -> Bytes {
        IVault::initializeCall {
            params: self.initializer_args(),
        }
        .abi_encode()
        .into()
    }
}

/// A vault proxy and the implementation it currently delegates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInstance {
    pub address: Address,
    /// Known when the vault was deployed in this run, absent for upgraded pinned vaults.
    pub config: Option<VaultConfig>,
    pub kind: ContractKind,
    pub implementation_version: u32,
}

impl VaultInstance {
    pub fn view(&self) -> ContractView {
        ContractView::new(self.address, self.kind)
    }
}

/// Creates vault proxies and upgrades them in place.
pub struct VaultDeployer<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> VaultDeployer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Deploy a vault proxy, initialize it with `config` and check that it reports the token
    /// addresses it was given.
    pub async fn deploy_vault(&self, config: VaultConfig) -> Result<VaultInstance, OrchestratorError> {
        let vault = self.create_vault(config).await?;
        if let Some(config) = &vault.config {
            self.check_token_addresses(vault.address, config).await?;
        }
        Ok(vault)
    }

    /// Deploy and initialize a vault proxy without reading anything back.
    ///
    /// The returned instance exists on chain once this succeeds, whatever a later check says.
    pub async fn create_vault(&self, config: VaultConfig) -> Result<VaultInstance, OrchestratorError> {
        config.validate()?;

        tracing::info!(
            name = %config.name,
            symbol = %config.symbol,
            token = %config.token,
            rewards_token = %config.rewards_token,
            "Deploying vault"
        );

        let address = deploy_proxy(self.client, ContractKind::Vault, config.initializer_calldata())
            .await
            .map_err(|source| OrchestratorError::Deployment {
                kind: ContractKind::Vault,
                source,
            })?;

        tracing::info!(address = %address, "Vault deployed");

        Ok(VaultInstance {
            address,
            config: Some(config),
            kind: ContractKind::Vault,
            implementation_version: ContractKind::Vault.implementation_version(),
        })
    }

    /// Repoint the vault proxy at `address` to the second implementation.
    ///
    /// The returned instance has the same address. On failure the proxy keeps its previous
    /// implementation.
    pub async fn upgrade_vault(&self, address: Address) -> Result<VaultInstance, OrchestratorError> {
        let target = ContractKind::VaultV2;
        let upgrade_error = |source| OrchestratorError::Upgrade {
            proxy: address,
            kind: target,
            source,
        };

        tracing::info!(address = %address, implementation = %target, "Upgrading vault");

        let pending = self
            .client
            .upgrade_implementation(address, target)
            .await
            .map_err(upgrade_error)?;
        let receipt = self
            .client
            .await_confirmation(pending)
            .await
            .map_err(upgrade_error)?;

        tracing::info!(
            address = %address,
            implementation = %target,
            tx_hash = %receipt.tx_hash,
            "Vault upgraded"
        );

        Ok(VaultInstance {
            address,
            config: None,
            kind: target,
            implementation_version: target.implementation_version(),
        })
    }

    /// Read the `(token, rewardsToken)` references back from a deployed vault.
    pub async fn read_token_addresses(
        &self,
        vault: Address,
    ) -> Result<(Address, Address), OrchestratorError> {
        let token = read(self.client, vault, IVault::tokenCall {})
            .await
            .map_err(|source| OrchestratorError::Read {
                address: vault,
                field: "token",
                source,
            })?
            ._0;
        let rewards_token = read(self.client, vault, IVault::rewardsTokenCall {})
            .await
            .map_err(|source| OrchestratorError::Read {
                address: vault,
                field: "rewardsToken",
                source,
            })?
            ._0;
        Ok((token, rewards_token))
    }

    /// Fail with [`OrchestratorError::PostDeployCheck`] unless `vault` reports the token
    /// addresses of `config`.
    pub async fn check_token_addresses(
        &self,
        vault: Address,
        config: &VaultConfig,
    ) -> Result<(), OrchestratorError> {
        let (token, rewards_token) = self.read_token_addresses(vault).await?;
        if token != config.token || rewards_token != config.rewards_token {
            return Err(OrchestratorError::PostDeployCheck {
                address: vault,
                reason: format!(
                    "expected token {} and rewards token {}, vault reports {token} and {rewards_token}",
                    config.token, config.rewards_token
                ),
            });
        }
        Ok(())
    }
}

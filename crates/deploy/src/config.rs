use std::path::PathBuf;

use alloy_core::primitives::{Address, address};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{AddressBook, ArtifactsConfig, OrchestratorError, RpcConfig};

/// The default name for the vaultkit configuration file.
pub const CONFIG_FILENAME: &str = "Vaultkit.toml";

/// Default initial supply of both tokens, in whole tokens.
pub const DEFAULT_INITIAL_SUPPLY: &str = "10000000000000";

/// Default administrator, receiver of the admin seeds.
pub const DEFAULT_ADMIN: Address = address!("5aF828D07f4e403522F2E88eC544E1F7D559E29d");

/// Name and symbol a token is initialized with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.trim().is_empty() || self.symbol.trim().is_empty() {
            return Err(OrchestratorError::InvalidTokenMetadata);
        }
        Ok(())
    }
}

/// The two token profiles the workflows deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenProfiles {
    pub primary: TokenMetadata,
    pub rewards: TokenMetadata,
}

impl Default for TokenProfiles {
    fn default() -> Self {
        Self {
            primary: TokenMetadata::new("VaultToken", "VT"),
            rewards: TokenMetadata::new("yVaultToken", "yVT"),
        }
    }
}

/// Scalar vault parameters. The two token addresses are filled in by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub name: String,
    pub symbol: String,
    pub flag_a: bool,
    pub flag_b: bool,
    pub param_x: u64,
    pub param_y: u64,
}

impl VaultSettings {
    /// Check the scalars alone, before the token addresses are known.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.trim().is_empty() || self.symbol.trim().is_empty() {
            return Err(OrchestratorError::InvalidVaultConfig(
                "name and symbol must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            name: "yVaultToken".to_string(),
            symbol: "yVT".to_string(),
            flag_a: false,
            flag_b: false,
            param_x: 100,
            param_y: 30,
        }
    }
}

/// Initial supplies as decimal strings of whole tokens, scaled by 10^18 when minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialBalances {
    /// Supply of the primary token.
    pub vault_token: String,
    /// Supply of the rewards token, seeded to the vault.
    pub vault_rewards: String,
}

impl Default for InitialBalances {
    fn default() -> Self {
        Self {
            vault_token: DEFAULT_INITIAL_SUPPLY.to_string(),
            vault_rewards: DEFAULT_INITIAL_SUPPLY.to_string(),
        }
    }
}

/// Everything a workflow run needs besides the chain client.
///
/// Loaded once before any workflow starts and handed by value to the
/// [`Orchestrator`](crate::Orchestrator). Serialized to/from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Receiver of the admin seeds.
    pub admin: Address,
    /// Also seed each token to the admin right after deploying it in deploy-token-and-vault.
    pub seed_admin_balances: bool,
    pub tokens: TokenProfiles,
    pub vault: VaultSettings,
    pub balances: InitialBalances,
    pub address_book: AddressBook,
    pub rpc: RpcConfig,
    pub artifacts: ArtifactsConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            admin: DEFAULT_ADMIN,
            seed_admin_balances: false,
            tokens: TokenProfiles::default(),
            vault: VaultSettings::default(),
            balances: InitialBalances::default(),
            address_book: AddressBook::default(),
            rpc: RpcConfig::default(),
            artifacts: ArtifactsConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize vaultkit config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Vaultkit.toml` inside a directory.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }
}

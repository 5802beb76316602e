//! Token deployment and attachment.

use alloy_core::primitives::Address;
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::{
    ChainClient, ContractKind, OrchestratorError, TokenMetadata,
    chain::{deploy_proxy, read},
    contracts::IVaultToken,
};

/// Tokens are never upgraded, every token proxy runs the first implementation.
pub const TOKEN_IMPLEMENTATION_VERSION: u32 = 1;

/// A deployed (or attached) token proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInstance {
    pub name: String,
    pub symbol: String,
    pub address: Address,
    pub implementation_version: u32,
}

/// Creates token proxies or binds to existing ones.
pub struct TokenDeployer<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> TokenDeployer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Deploy a new token proxy and initialize it with `(name, symbol)`.
    ///
    /// Fails with [`OrchestratorError::InvalidTokenMetadata`] before any remote call when either
    /// is empty. A rejected creation or initializer leaves the instance not deployed.
    pub async fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
    ) -> Result<TokenInstance, OrchestratorError> {
        TokenMetadata::new(name, symbol).validate()?;

        tracing::info!(name, symbol, "Deploying token");

        let initializer = IVaultToken::initializeCall {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
        .abi_encode();

        let address = deploy_proxy(self.client, ContractKind::VaultToken, initializer.into())
            .await
            .map_err(|source| OrchestratorError::Deployment {
                kind: ContractKind::VaultToken,
                source,
            })?;

        tracing::info!(name, symbol, address = %address, "Token deployed");

        Ok(TokenInstance {
            name: name.to_string(),
            symbol: symbol.to_string(),
            address,
            implementation_version: TOKEN_IMPLEMENTATION_VERSION,
        })
    }

    /// Bind to an already deployed token proxy.
    ///
    /// Reads `name()` and `symbol()`; an address that cannot answer both does not expose the
    /// token interface.
    pub async fn attach_token(&self, address: Address) -> Result<TokenInstance, OrchestratorError> {
        let attach_error = |source| OrchestratorError::Attach {
            address,
            kind: ContractKind::VaultToken,
            source,
        };

        let name = read(self.client, address, IVaultToken::nameCall {})
            .await
            .map_err(attach_error)?
            ._0;
        let symbol = read(self.client, address, IVaultToken::symbolCall {})
            .await
            .map_err(attach_error)?
            ._0;

        tracing::info!(
            name = %name,
            symbol = %symbol,
            address = %address,
            "Attached to existing token"
        );

        Ok(TokenInstance {
            name,
            symbol,
            address,
            implementation_version: TOKEN_IMPLEMENTATION_VERSION,
        })
    }
}

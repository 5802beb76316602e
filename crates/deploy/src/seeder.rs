//! Initial balance seeding.

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    ChainClient, OrchestratorError,
    chain::{read, transact},
    contracts::IVaultToken,
    units::format_token_amount,
};

/// A confirmed mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    pub token: Address,
    pub recipient: Address,
    /// Minted quantity in base units.
    pub amount: U256,
    /// Balance of the recipient read back after confirmation, `None` until the read succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
}

/// Mints initial supplies.
///
/// Minting is not idempotent: seeding the same recipient twice mints twice.
pub struct BalanceSeeder<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> BalanceSeeder<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Mint `amount` base units of `token` to `recipient` and read the recipient's balance back
    /// after confirmation.
    pub async fn mint(
        &self,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<MintRecord, OrchestratorError> {
        let mut record = self.send_mint(token, recipient, amount).await?;
        self.read_balance(&mut record).await?;
        Ok(record)
    }

    /// Mint and wait for the confirmation only. The returned record has no balance yet.
    pub async fn send_mint(
        &self,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<MintRecord, OrchestratorError> {
        tracing::info!(
            token = %token,
            recipient = %recipient,
            amount = %format_token_amount(amount),
            "Minting tokens"
        );

        let receipt = transact(
            self.client,
            token,
            IVaultToken::mintCall {
                to: recipient,
                amount,
            },
        )
        .await
        .map_err(|source| OrchestratorError::Mint {
            token,
            recipient,
            amount,
            source,
        })?;

        tracing::info!(
            token = %token,
            recipient = %recipient,
            tx_hash = %receipt.tx_hash,
            "Mint confirmed"
        );

        Ok(MintRecord {
            token,
            recipient,
            amount,
            balance: None,
        })
    }

    /// Read the recipient's balance of a confirmed mint into `record`.
    pub async fn read_balance(&self, record: &mut MintRecord) -> Result<U256, OrchestratorError> {
        let balance = read(
            self.client,
            record.token,
            IVaultToken::balanceOfCall {
                account: record.recipient,
            },
        )
        .await
        .map_err(|source| OrchestratorError::Read {
            address: record.token,
            field: "balanceOf",
            source,
        })?
        ._0;

        tracing::info!(
            token = %record.token,
            recipient = %record.recipient,
            balance = %format_token_amount(balance),
            "Balance read back"
        );
        record.balance = Some(balance);
        Ok(balance)
    }
}

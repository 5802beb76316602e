//! Post-upgrade sanity check.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    ChainClient, ContractKind, ContractView, OrchestratorError,
    chain::read,
    contracts::{IVault, IVaultToken, IVaultV2},
};

/// Result of comparing the `name()` read through two views of a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub old_view: ContractView,
    pub new_view: ContractView,
    /// Both views are bound to the same proxy address.
    pub same_address: bool,
    pub old_value: String,
    pub new_value: String,
    /// Same address and the same value through both views.
    pub matches: bool,
}

/// `name()` as read through a view at some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub view: ContractView,
    pub value: String,
}

/// Compares an observable field through the pre- and post-upgrade interfaces.
///
/// Advisory only: a mismatch is reported, never rolled back.
pub struct UpgradeVerifier<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> UpgradeVerifier<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Read `name()` through both views now and compare.
    pub async fn verify(
        &self,
        old_view: ContractView,
        new_view: ContractView,
    ) -> Result<VerificationReport, OrchestratorError> {
        let snapshot = self.snapshot(old_view).await?;
        self.verify_snapshot(&snapshot, new_view).await
    }

    /// Capture `name()` through `view`, typically right before an upgrade.
    pub async fn snapshot(&self, view: ContractView) -> Result<Snapshot, OrchestratorError> {
        let value = self.read_name(view).await?;
        tracing::debug!(address = %view.address, kind = %view.kind, name = %value, "Captured name");
        Ok(Snapshot { view, value })
    }

    /// Compare a value captured earlier with `name()` read through `new_view` now.
    pub async fn verify_snapshot(
        &self,
        snapshot: &Snapshot,
        new_view: ContractView,
    ) -> Result<VerificationReport, OrchestratorError> {
        let old_view = snapshot.view;
        let old_value = snapshot.value.clone();
        let new_value = self.read_name(new_view).await?;

        let same_address = old_view.address == new_view.address;
        let matches = same_address && old_value == new_value;

        if matches {
            tracing::info!(
                address = %new_view.address,
                name = %new_value,
                "Vault name preserved by the upgrade"
            );
        } else if !same_address {
            tracing::warn!(
                old_address = %old_view.address,
                new_address = %new_view.address,
                "Compared views are bound to different addresses"
            );
        } else {
            tracing::warn!(
                address = %new_view.address,
                old_name = %old_value,
                new_name = %new_value,
                "Vault name was upgraded to {new_value} from {old_value}"
            );
        }

        Ok(VerificationReport {
            old_view,
            new_view,
            same_address,
            old_value,
            new_value,
            matches,
        })
    }

    async fn read_name(&self, view: ContractView) -> Result<String, OrchestratorError> {
        let address: Address = view.address;
        let result = match view.kind {
            ContractKind::VaultToken => read(self.client, address, IVaultToken::nameCall {})
                .await
                .map(|r| r._0),
            ContractKind::Vault => read(self.client, address, IVault::nameCall {})
                .await
                .map(|r| r._0),
            ContractKind::VaultV2 => read(self.client, address, IVaultV2::nameCall {})
                .await
                .map(|r| r._0),
        };

        result.map_err(|source| OrchestratorError::Read {
            address,
            field: "name",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, SimulatedChain, VaultConfig, VaultDeployer, VaultSettings};

    fn pinned_vault(chain: &SimulatedChain, address: Address) {
        let config = VaultConfig::from_settings(
            Address::repeat_byte(0x03),
            Address::repeat_byte(0xe6),
            &VaultSettings::default(),
        );
        chain.pin_vault(address, config.initializer_args());
    }

    #[tokio::test]
    async fn test_matching_upgrade() {
        let chain = SimulatedChain::new(Address::repeat_byte(0x5a));
        let vault = Address::repeat_byte(0xce);
        pinned_vault(&chain, vault);
        VaultDeployer::new(&chain).upgrade_vault(vault).await.unwrap();

        let report = UpgradeVerifier::new(&chain)
            .verify(
                ContractView::new(vault, ContractKind::Vault),
                ContractView::new(vault, ContractKind::VaultV2),
            )
            .await
            .unwrap();
        assert!(report.matches);
        assert!(report.same_address);
        assert_eq!(report.old_value, "yVaultToken");
    }

    #[tokio::test]
    async fn test_snapshot_before_upgrade() {
        let chain = SimulatedChain::new(Address::repeat_byte(0x5a));
        let vault = Address::repeat_byte(0xce);
        pinned_vault(&chain, vault);
        chain.rename_on_upgrade("yVaultToken V2");

        let verifier = UpgradeVerifier::new(&chain);
        let snapshot = verifier
            .snapshot(ContractView::new(vault, ContractKind::Vault))
            .await
            .unwrap();
        VaultDeployer::new(&chain).upgrade_vault(vault).await.unwrap();

        let report = verifier
            .verify_snapshot(&snapshot, ContractView::new(vault, ContractKind::VaultV2))
            .await
            .unwrap();
        assert!(!report.matches);
        assert!(report.same_address);
        assert_eq!(report.old_value, "yVaultToken");
        assert_eq!(report.new_value, "yVaultToken V2");
    }

    #[tokio::test]
    async fn test_different_addresses_never_match() {
        let chain = SimulatedChain::new(Address::repeat_byte(0x5a));
        let first = Address::repeat_byte(0xc1);
        let second = Address::repeat_byte(0xc2);
        pinned_vault(&chain, first);
        pinned_vault(&chain, second);

        let report = UpgradeVerifier::new(&chain)
            .verify(
                ContractView::new(first, ContractKind::Vault),
                ContractView::new(second, ContractKind::Vault),
            )
            .await
            .unwrap();
        assert!(!report.same_address);
        assert!(!report.matches);
        assert_eq!(report.old_value, report.new_value);
    }

    #[tokio::test]
    async fn test_read_failure() {
        let chain = SimulatedChain::new(Address::repeat_byte(0x5a));
        let missing = Address::repeat_byte(0x99);

        let err = UpgradeVerifier::new(&chain)
            .verify(
                ContractView::new(missing, ContractKind::Vault),
                ContractView::new(missing, ContractKind::VaultV2),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadFailure);
    }
}

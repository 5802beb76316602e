//! Solidity interfaces of the contracts managed by vaultkit.
//!
//! Only the functions the deployment flow touches are declared here. The contract
//! implementations themselves live outside of this repository and are deployed from their
//! compiled artifacts.

use alloy_core::primitives::Address;
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};

sol! {
    #![sol(all_derives)]

    /// Positional initializer argument of the vault contract.
    ///
    /// The vault initializer receives these eight fields as a single tuple, without names at
    /// the call boundary. Build it through [`crate::VaultConfig::initializer_args`] only.
    struct VaultParams {
        address token;
        address rewardsToken;
        string name;
        string symbol;
        bool flagA;
        bool flagB;
        uint256 paramX;
        uint256 paramY;
    }

    /// Upgradeable ERC20 token with an owner-restricted mint.
    interface IVaultToken {
        function initialize(string name, string symbol) external;
        function mint(address to, uint256 amount) external;
        function balanceOf(address account) external view returns (uint256);
        function name() external view returns (string);
        function symbol() external view returns (string);
    }

    /// First vault implementation.
    interface IVault {
        function initialize(VaultParams params) external;
        function token() external view returns (address);
        function rewardsToken() external view returns (address);
        function name() external view returns (string);
    }

    /// Second vault implementation, storage compatible with [`IVault`].
    interface IVaultV2 {
        function token() external view returns (address);
        function rewardsToken() external view returns (address);
        function name() external view returns (string);
    }

    /// UUPS upgrade entrypoint exposed by every implementation behind a proxy.
    interface IUUPSUpgradeable {
        function upgradeToAndCall(address newImplementation, bytes data) external payable;
    }
}

/// The contract implementations vaultkit knows how to put behind a proxy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ContractKind {
    /// The fungible token (`VaultToken`).
    VaultToken,
    /// The first vault implementation (`Vault`).
    Vault,
    /// The upgraded vault implementation (`VaultV2`).
    VaultV2,
}

impl ContractKind {
    /// The logical implementation version a proxy delegating to this kind runs.
    pub fn implementation_version(&self) -> u32 {
        match self {
            ContractKind::VaultToken | ContractKind::Vault => 1,
            ContractKind::VaultV2 => 2,
        }
    }

    /// The name of the compiled contract artifact.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ContractKind::VaultToken => "VaultToken",
            ContractKind::Vault => "Vault",
            ContractKind::VaultV2 => "VaultV2",
        }
    }

    /// Whether a proxy currently delegating to `self` may be repointed to `next`.
    ///
    /// Vault implementations share a storage layout, tokens are never upgraded.
    pub fn can_upgrade_to(&self, next: ContractKind) -> bool {
        matches!(
            (self, next),
            (ContractKind::Vault, ContractKind::VaultV2)
                | (ContractKind::Vault, ContractKind::Vault)
                | (ContractKind::VaultV2, ContractKind::VaultV2)
        )
    }
}

/// A contract interface bound to an address.
///
/// Two views over the same address with different kinds describe the same proxy before and
/// after an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractView {
    pub address: Address,
    pub kind: ContractKind,
}

impl ContractView {
    pub fn new(address: Address, kind: ContractKind) -> Self {
        Self { address, kind }
    }
}

//! Pinned addresses of already deployed instances.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::OrchestratorError;

/// Label of the pinned primary token.
pub const VAULT_TOKEN: &str = "vault_token";
/// Label of the pinned rewards token.
pub const REWARDS_TOKEN: &str = "rewards_token";
/// Label of the pinned vault proxy.
pub const VAULT: &str = "vault";

/// A single `{label, address}` pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBookEntry {
    pub label: String,
    pub address: Address,
}

/// Addresses of instances that must be reused rather than redeployed, keyed by label.
///
/// Serialized as a plain table:
///
/// ```toml
/// [address_book]
/// vault_token = "0x0372c5F3e23AD56AF9694462300c92632b6ee326"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref)]
#[serde(transparent)]
pub struct AddressBook(BTreeMap<String, Address>);

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `address` under `label`, replacing any previous pin.
    pub fn pin(&mut self, label: impl Into<String>, address: Address) -> &mut Self {
        self.0.insert(label.into(), address);
        self
    }

    /// Look up a pin a workflow cannot run without.
    pub fn pinned(&self, label: &str) -> Result<AddressBookEntry, OrchestratorError> {
        self.0
            .get(label)
            .map(|address| AddressBookEntry {
                label: label.to_string(),
                address: *address,
            })
            .ok_or_else(|| OrchestratorError::MissingPin(label.to_string()))
    }
}

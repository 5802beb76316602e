use std::path::Path;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    AddressBook, MintRecord, REWARDS_TOKEN, Step, TokenRole, VAULT, VAULT_TOKEN, WorkflowReport,
};

/// Default name of the deployments record file.
pub const DEPLOYMENTS_FILENAME: &str = "deployments.json";

/// What a run left on chain, persisted after the run for the operator.
///
/// The record is informational only: nothing reads it back to skip steps, so re-running a
/// workflow mints again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// SHA-256 of the workflow name, sender and timestamp.
    pub run_id: String,
    pub workflow: String,
    /// `done`, or `aborted at <step>`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub sender: Address,
    pub recorded_at: DateTime<Utc>,
    /// Vaultkit version that produced this record.
    pub vaultkit_version: String,
    /// Addresses produced by confirmed steps, labelled like the address book.
    pub addresses: AddressBook,
    /// Mints that landed on chain.
    pub mints: Vec<MintRecord>,
}

impl DeploymentRecord {
    /// Build the record of a finished run.
    pub fn from_report(report: &WorkflowReport) -> Self {
        Self::from_report_at(report, Utc::now())
    }

    fn from_report_at(report: &WorkflowReport, recorded_at: DateTime<Utc>) -> Self {
        let (outcome, error) = match report.failure() {
            None => ("done".to_string(), None),
            Some((step, error)) => (format!("aborted at {step}"), Some(error.to_string())),
        };

        let mut addresses = AddressBook::new();
        for (step, address) in report.addresses() {
            let label = match step {
                Step::DeployToken(TokenRole::Primary) => VAULT_TOKEN,
                Step::DeployToken(TokenRole::Rewards)
                | Step::AttachExistingToken(TokenRole::Rewards) => REWARDS_TOKEN,
                Step::AttachExistingToken(TokenRole::Primary) => VAULT_TOKEN,
                Step::DeployVault | Step::UpgradeVault => VAULT,
                Step::Init | Step::Seed { .. } | Step::Verify => continue,
            };
            addresses.pin(label, address);
        }
        // A vault whose post-deploy check failed exists on chain without a confirmed step.
        if let Some(vault) = &report.vault {
            addresses.pin(VAULT, vault.address);
        }

        Self {
            run_id: run_id(report.workflow, report.sender, recorded_at),
            workflow: report.workflow.to_string(),
            outcome,
            error,
            sender: report.sender,
            recorded_at,
            vaultkit_version: env!("CARGO_PKG_VERSION").to_string(),
            addresses,
            mints: report.mints.clone(),
        }
    }

    /// Save this record as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;

        std::fs::write(path, json).context(format!(
            "Failed to write deployment record to {}",
            path.display()
        ))?;

        tracing::info!(path = %path.display(), run_id = %self.run_id, "Deployment record saved");
        Ok(())
    }

    /// Load a record from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path).context(format!(
            "Failed to read deployment record from {}",
            path.display()
        ))?;

        serde_json::from_str(&content).context("Failed to parse deployment record JSON")
    }
}

fn run_id(workflow: &str, sender: Address, recorded_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workflow.as_bytes());
    hasher.update(sender.as_slice());
    hasher.update(recorded_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

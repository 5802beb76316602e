//! Compiled contract artifacts used by the JSON-RPC client.

use std::{collections::HashMap, path::PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ContractKind;

/// Default directory holding the compiled bytecode files.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Locations of the hex-encoded creation bytecode of every contract vaultkit deploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// The ERC-1967 proxy, constructed as `ERC1967Proxy(implementation, data)`.
    pub proxy: PathBuf,
    pub vault_token: PathBuf,
    pub vault: PathBuf,
    pub vault_v2: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        let dir = PathBuf::from(DEFAULT_ARTIFACTS_DIR);
        Self {
            proxy: dir.join("ERC1967Proxy.bin"),
            vault_token: dir.join("VaultToken.bin"),
            vault: dir.join("Vault.bin"),
            vault_v2: dir.join("VaultV2.bin"),
        }
    }
}

impl ArtifactsConfig {
    fn path_for(&self, kind: ContractKind) -> &PathBuf {
        match kind {
            ContractKind::VaultToken => &self.vault_token,
            ContractKind::Vault => &self.vault,
            ContractKind::VaultV2 => &self.vault_v2,
        }
    }
}

/// Creation bytecode loaded in memory.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    pub proxy: Bytes,
    implementations: HashMap<ContractKind, Bytes>,
}

impl Artifacts {
    /// Load every artifact listed in `config`.
    pub fn load(config: &ArtifactsConfig) -> Result<Self> {
        let proxy = read_bytecode(&config.proxy).context("Failed to load proxy artifact")?;

        let mut implementations = HashMap::new();
        for kind in [
            ContractKind::VaultToken,
            ContractKind::Vault,
            ContractKind::VaultV2,
        ] {
            let bytecode = read_bytecode(config.path_for(kind))
                .with_context(|| format!("Failed to load {} artifact", kind.artifact_name()))?;
            implementations.insert(kind, bytecode);
        }

        tracing::debug!(count = implementations.len() + 1, "Contract artifacts loaded");

        Ok(Self {
            proxy,
            implementations,
        })
    }

    pub fn implementation(&self, kind: ContractKind) -> Option<&Bytes> {
        self.implementations.get(&kind)
    }
}

/// Read a hex bytecode file, with or without a `0x` prefix and surrounding whitespace.
fn read_bytecode(path: &PathBuf) -> Result<Bytes> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    decode_bytecode(&content).with_context(|| format!("Invalid bytecode in {}", path.display()))
}

fn decode_bytecode(content: &str) -> Result<Bytes> {
    let trimmed = content.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_str.is_empty() {
        anyhow::bail!("Bytecode is empty");
    }
    let bytes = hex::decode(hex_str).context("Bytecode is not valid hex")?;
    Ok(Bytes::from(bytes))
}

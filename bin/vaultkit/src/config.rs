//! Layered configuration: defaults, TOML file, `VAULTKIT_` environment, CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use vaultkit_deploy::{CONFIG_FILENAME, DeployConfig};

use crate::cli::Cli;

/// Environment prefix; `__` separates nested keys (`VAULTKIT_RPC__URL`).
const ENV_PREFIX: &str = "VAULTKIT_";

/// Resolve the configuration file to read, if any.
///
/// An explicit path must exist. Without one, `./Vaultkit.toml` is used when present.
pub fn config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) if path.is_dir() => {
            let path = path.join(CONFIG_FILENAME);
            anyhow::ensure!(path.exists(), "Configuration file not found: {}", path.display());
            Ok(Some(path))
        }
        Some(path) => {
            anyhow::ensure!(path.exists(), "Configuration file not found: {}", path.display());
            Ok(Some(path.to_path_buf()))
        }
        None => {
            let default = PathBuf::from(CONFIG_FILENAME);
            Ok(default.exists().then_some(default))
        }
    }
}

/// Build the configuration of this run.
pub fn load(cli: &Cli) -> Result<DeployConfig> {
    let path = config_path(cli.config.as_deref())?;
    let mut config = layered(path.as_deref())?;

    if let Some(url) = &cli.rpc_url {
        config.rpc.url = url.clone();
    }
    if let Some(from) = cli.from {
        config.rpc.sender = Some(from);
    }

    tracing::debug!(
        path = ?path,
        admin = %config.admin,
        rpc_url = %config.rpc.url,
        pins = config.address_book.len(),
        "Configuration resolved"
    );
    Ok(config)
}

fn layered(path: Option<&Path>) -> Result<DeployConfig> {
    let mut figment = Figment::from(Serialized::defaults(DeployConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")
}

use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use vaultkit_deploy::{TokenMetadata, TokenRole, Workflow};

#[derive(Parser)]
#[command(name = "vaultkit")]
#[command(
    author,
    version,
    about = "Deploy, seed and upgrade proxied token and vault contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "VAULTKIT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Vaultkit.toml configuration file, or to a directory containing one.
    ///
    /// Defaults to ./Vaultkit.toml when it exists.
    #[arg(long, alias = "conf", global = true, env = "VAULTKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// The URL of the JSON-RPC endpoint. Overrides `rpc.url`.
    #[arg(long, alias = "rpc", global = true, env = "VAULTKIT_RPC_URL")]
    pub rpc_url: Option<String>,

    /// The account transactions are sent from. Overrides `rpc.sender`.
    ///
    /// The node must sign for this account (`eth_sendTransaction`).
    #[arg(long, global = true, env = "VAULTKIT_FROM")]
    pub from: Option<Address>,

    /// Run the workflow against an in-memory chain seeded from the address book instead of the
    /// RPC endpoint.
    #[arg(long, global = true, env = "VAULTKIT_SIMULATE")]
    pub simulate: bool,

    /// Write a JSON record of the run (addresses, mints, outcome) to this path.
    #[arg(long, global = true, env = "VAULTKIT_DEPLOYMENTS_OUT")]
    pub deployments_out: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Deploy one token and seed its initial supply to the admin.
    DeployToken {
        /// The token profile to deploy.
        #[arg(long, default_value_t = TokenRole::Primary)]
        profile: TokenRole,

        /// Override the profile name.
        #[arg(long, requires = "symbol")]
        name: Option<String>,

        /// Override the profile symbol.
        #[arg(long, requires = "name")]
        symbol: Option<String>,
    },
    /// Deploy both tokens and a vault referencing them, then seed the rewards supply to the vault.
    #[command(alias = "deploy-token-and-rewards-and-vault")]
    DeployTokenAndVault,
    /// Deploy a vault against the pinned tokens, then seed the rewards supply to it.
    DeployVault,
    /// Upgrade the pinned vault to its second implementation in place.
    UpgradeVault,
    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Command {
    /// The workflow this subcommand runs, if any.
    pub fn workflow(&self) -> Option<Workflow> {
        match self {
            Command::DeployToken {
                profile,
                name,
                symbol,
            } => {
                let metadata = match (name, symbol) {
                    (Some(name), Some(symbol)) => Some(TokenMetadata::new(name, symbol)),
                    _ => None,
                };
                Some(Workflow::DeployToken {
                    role: *profile,
                    metadata,
                })
            }
            Command::DeployTokenAndVault => Some(Workflow::DeployTokenAndVault),
            Command::DeployVault => Some(Workflow::DeployVault),
            Command::UpgradeVault => Some(Workflow::UpgradeVault),
            Command::InitConfig { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_token() {
        let cli = Cli::try_parse_from(["vaultkit", "deploy-token", "--profile", "rewards"]).unwrap();
        assert_eq!(
            cli.command.workflow(),
            Some(Workflow::DeployToken {
                role: TokenRole::Rewards,
                metadata: None
            })
        );
        assert!(!cli.simulate);
    }

    #[test]
    fn test_parse_metadata_override() {
        let cli = Cli::try_parse_from([
            "vaultkit",
            "deploy-token",
            "--name",
            "Staked Vault",
            "--symbol",
            "sVLT",
        ])
        .unwrap();
        assert_eq!(
            cli.command.workflow(),
            Some(Workflow::DeployToken {
                role: TokenRole::Primary,
                metadata: Some(TokenMetadata::new("Staked Vault", "sVLT"))
            })
        );

        assert!(Cli::try_parse_from(["vaultkit", "deploy-token", "--name", "Only Name"]).is_err());
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "vaultkit",
            "upgrade-vault",
            "--simulate",
            "--from",
            "0x5aF828D07f4e403522F2E88eC544E1F7D559E29d",
            "--deployments-out",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::UpgradeVault);
        assert!(cli.simulate);
        assert!(cli.from.is_some());
        assert_eq!(cli.deployments_out, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_workflow_alias() {
        let cli =
            Cli::try_parse_from(["vaultkit", "deploy-token-and-rewards-and-vault"]).unwrap();
        assert_eq!(cli.command.workflow(), Some(Workflow::DeployTokenAndVault));
    }
}

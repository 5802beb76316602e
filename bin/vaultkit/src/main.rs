//! vaultkit deploys, seeds and upgrades proxied token and vault contracts.

mod cli;
mod config;
mod report;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use vaultkit_deploy::{
    Artifacts, CONFIG_FILENAME, ChainClient, DeployConfig, DeploymentRecord, Orchestrator,
    RpcChainClient, SimulatedChain, Workflow,
};

/// The run reached its last step.
const EXIT_DONE: u8 = 0;
/// A step failed; earlier steps stay confirmed on chain.
const EXIT_ABORTED: u8 = 1;
/// Nothing was sent: bad arguments, configuration or connection.
const EXIT_STARTUP: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = format!("{err:#}"), "vaultkit failed to start");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    if let Command::InitConfig { force } = cli.command {
        init_config(cli.config.clone(), force)?;
        return Ok(EXIT_DONE);
    }
    let workflow = cli
        .command
        .workflow()
        .context("Subcommand does not run a workflow")?;

    let config = config::load(&cli)?;

    if cli.simulate {
        tracing::info!(pins = config.address_book.len(), "Using the in-memory chain");
        let chain = SimulatedChain::with_pins(&config);
        return execute(chain, config, workflow, cli.deployments_out).await;
    }

    let artifacts = Artifacts::load(&config.artifacts)?;
    let client = RpcChainClient::connect(config.rpc.clone(), artifacts).await?;
    execute(client, config, workflow, cli.deployments_out).await
}

async fn execute<C: ChainClient>(
    client: C,
    config: DeployConfig,
    workflow: Workflow,
    deployments_out: Option<PathBuf>,
) -> Result<u8> {
    let orchestrator = Orchestrator::new(client, config);
    let report = orchestrator.run(workflow).await;

    println!("{}", report::steps_table(&report));
    if let Some(balances) = report::balances_table(&report) {
        println!("{balances}");
    }
    println!("{}", report::summary(&report));

    // The exit code reflects the run, not the record.
    if let Some(path) = deployments_out
        && let Err(err) = DeploymentRecord::from_report(&report).save_to_file(&path)
    {
        tracing::error!(
            path = %path.display(),
            error = format!("{err:#}"),
            "Failed to save the deployment record"
        );
    }

    Ok(if report.is_done() {
        EXIT_DONE
    } else {
        EXIT_ABORTED
    })
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
        Some(path) => path,
        None => PathBuf::from(CONFIG_FILENAME),
    };

    anyhow::ensure!(
        force || !path.exists(),
        "{} already exists, pass --force to overwrite it",
        path.display()
    );
    DeployConfig::default().save_to_file(&path)
}

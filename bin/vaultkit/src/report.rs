use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use vaultkit_deploy::{Outcome, WorkflowReport, units::format_token_amount};

/// Render the confirmed steps of a run as a table.
pub fn steps_table(report: &WorkflowReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Step", "Address", "Detail"]);

    for (index, record) in report.steps.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(record.step),
            Cell::new(
                record
                    .address
                    .map(|address| address.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(&record.detail),
        ]);
    }

    if let Outcome::Aborted { step, error } = &report.outcome {
        table.add_row(vec![
            Cell::new("x").fg(Color::Red),
            Cell::new(step).fg(Color::Red),
            Cell::new(""),
            Cell::new(format!("{}: {error}", error.kind())).fg(Color::Red),
        ]);
    }
    table
}

/// Render the balances read back after every mint.
pub fn balances_table(report: &WorkflowReport) -> Option<Table> {
    if report.mints.is_empty() {
        return None;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Token", "Recipient", "Minted", "Balance"]);
    for mint in &report.mints {
        table.add_row(vec![
            mint.token.to_string(),
            mint.recipient.to_string(),
            format_token_amount(mint.amount),
            mint.balance
                .map(format_token_amount)
                .unwrap_or_else(|| "not read back".to_string()),
        ]);
    }
    Some(table)
}

/// One-line summary of how the run ended.
pub fn summary(report: &WorkflowReport) -> String {
    match &report.outcome {
        Outcome::Done => format!("{} done ({} steps)", report.workflow, report.steps.len()),
        Outcome::Aborted { step, .. } => format!(
            "{} aborted at {step}; the {} steps above are confirmed on chain",
            report.workflow,
            report.steps.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkit_deploy::{DeployConfig, Orchestrator, SimulatedChain, SimulatedOperation, Workflow};

    #[tokio::test]
    async fn test_render_done_report() {
        let config = DeployConfig::default();
        let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);
        let report = orchestrator.run(Workflow::DeployTokenAndVault).await;

        let rendered = steps_table(&report).to_string();
        assert!(rendered.contains("deploy-token(primary)"));
        assert!(rendered.contains("seed(rewards -> vault)"));

        let balances = balances_table(&report).expect("a mint should be listed").to_string();
        assert!(balances.contains("10000000000000"));
        assert_eq!(summary(&report), "deploy-token-and-vault done (5 steps)");
    }

    #[tokio::test]
    async fn test_render_aborted_report() {
        let config = DeployConfig::default();
        let orchestrator = Orchestrator::new(SimulatedChain::new(config.admin), config);
        orchestrator
            .client()
            .fail_next(SimulatedOperation::CreateProxy, "insufficient funds");
        let report = orchestrator.run(Workflow::DeployTokenAndVault).await;

        let rendered = steps_table(&report).to_string();
        assert!(rendered.contains("DeploymentFailure"));
        assert!(balances_table(&report).is_none());
        assert_eq!(
            summary(&report),
            "deploy-token-and-vault aborted at deploy-token(primary); the 1 steps above are confirmed on chain"
        );
    }
}

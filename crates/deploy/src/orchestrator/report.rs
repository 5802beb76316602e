use std::fmt;

use alloy_core::primitives::Address;

use super::Step;
use crate::{
    MintRecord, OrchestratorError, TokenInstance, VaultInstance, VerificationReport,
    units::format_token_amount,
};

/// Terminal state of a workflow run.
#[derive(Debug)]
pub enum Outcome {
    /// Every step was confirmed.
    Done,
    /// `step` failed; the steps before it stay confirmed on chain.
    Aborted {
        step: Step,
        error: OrchestratorError,
    },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }
}

/// A confirmed step and what it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    /// The address the step created, attached to or minted on.
    pub address: Option<Address>,
    pub detail: String,
}

/// Everything a run confirmed, in order, and how it ended.
#[derive(Debug)]
pub struct WorkflowReport {
    pub workflow: &'static str,
    pub sender: Address,
    pub steps: Vec<StepRecord>,
    pub tokens: Vec<TokenInstance>,
    pub vault: Option<VaultInstance>,
    pub mints: Vec<MintRecord>,
    pub verification: Option<VerificationReport>,
    pub outcome: Outcome,
}

impl WorkflowReport {
    pub(crate) fn new(workflow: &'static str, sender: Address) -> Self {
        Self {
            workflow,
            sender,
            steps: Vec::new(),
            tokens: Vec::new(),
            vault: None,
            mints: Vec::new(),
            verification: None,
            outcome: Outcome::Done,
        }
    }

    pub(crate) fn record(&mut self, step: Step, address: Option<Address>, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            step,
            address,
            detail: detail.into(),
        });
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_done()
    }

    /// The failing step and its error, if the run was aborted.
    pub fn failure(&self) -> Option<(&Step, &OrchestratorError)> {
        match &self.outcome {
            Outcome::Done => None,
            Outcome::Aborted { step, error } => Some((step, error)),
        }
    }

    /// Every address produced by a confirmed step.
    pub fn addresses(&self) -> impl Iterator<Item = (&Step, Address)> {
        self.steps
            .iter()
            .filter_map(|record| record.address.map(|address| (&record.step, address)))
    }
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Done => writeln!(f, "{}: done", self.workflow)?,
            Outcome::Aborted { step, .. } => {
                writeln!(f, "{}: aborted at {step}", self.workflow)?
            }
        }

        for record in &self.steps {
            match record.address {
                Some(address) => writeln!(f, "  {} {address} {}", record.step, record.detail)?,
                None => writeln!(f, "  {} {}", record.step, record.detail)?,
            }
        }

        for mint in &self.mints {
            match mint.balance {
                Some(balance) => writeln!(
                    f,
                    "  balance of {} on {}: {}",
                    mint.recipient,
                    mint.token,
                    format_token_amount(balance)
                )?,
                None => writeln!(
                    f,
                    "  minted {} on {} to {}, balance not read back",
                    format_token_amount(mint.amount),
                    mint.token,
                    mint.recipient
                )?,
            }
        }

        if let Some((step, error)) = self.failure() {
            write!(f, "  {step} failed ({}): {error}", error.kind())?;
        }
        Ok(())
    }
}

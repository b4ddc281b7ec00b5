//! Typed per-step side-effect results.
//!
//! Best-effort steps used to be caught and logged only; callers could not
//! tell which secondary records were missing. Every orchestrating operation
//! now returns a report so repair jobs can discover exactly what to fix.

use serde::{Deserialize, Serialize};

use fulcrum_core::RecordId;

/// The best-effort steps an operation may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectStep {
    Invoice,
    Receivable,
    Payment,
    PartnerEarning,
    ProcessInstance,
    Payable,
    VoidInvoice,
}

/// Outcome of one best-effort step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectOutcome {
    pub step: SideEffectStep,
    /// The created record's id on success (absent for void operations), or
    /// the failure message.
    pub result: Result<Option<RecordId>, String>,
}

/// Collected outcomes of every best-effort step of an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideEffectReport {
    pub steps: Vec<SideEffectOutcome>,
}

impl SideEffectReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(&mut self, step: SideEffectStep, record_id: Option<RecordId>) {
        self.steps.push(SideEffectOutcome {
            step,
            result: Ok(record_id),
        });
    }

    pub fn failed(&mut self, step: SideEffectStep, message: impl Into<String>) {
        self.steps.push(SideEffectOutcome {
            step,
            result: Err(message.into()),
        });
    }

    /// True when every attempted step succeeded.
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SideEffectOutcome> {
        self.steps.iter().filter(|s| s.result.is_err())
    }

    pub fn merge(&mut self, other: SideEffectReport) {
        self.steps.extend(other.steps);
    }
}

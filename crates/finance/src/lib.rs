//! `fulcrum-finance` — external financial and workflow collaborators.
//!
//! The engine hands invoices, receivables, payments, partner earnings and
//! process instances off through the narrow traits here. All of these writes
//! are best-effort: a failure is logged, captured in the per-step
//! [`SideEffectReport`], and never rolls back the primary operation.

pub mod ledger;
pub mod report;
pub mod workflow;

pub use ledger::{
    FailingLedger, FinancialLedger, RecordingLedger, SaleDocument, SaleDocumentLine,
    SaleFinancials, StoreLedger,
};
pub use report::{SideEffectOutcome, SideEffectReport, SideEffectStep};
pub use workflow::{NoopWorkflow, RecordingWorkflow, WorkflowService};

//! `fulcrum-costing` — weighted moving average (CMPM) cost valuation.
//!
//! Average cost changes only on incoming, cost-bearing movements. Outgoing
//! movements consume the current average as the sale's cost snapshot and
//! never touch it. Every recalculation leaves a `cost_history` audit entry.

pub mod average;
pub mod engine;
pub mod history;

pub use average::{CostApplication, apply_incoming};
pub use engine::CostEngine;
pub use history::CostHistoryEntry;

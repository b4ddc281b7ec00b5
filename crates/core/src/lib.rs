//! `fulcrum-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! tenant/record identifiers, the engine error model, and the decimal rounding
//! conventions shared by the costing and order modules.

pub mod error;
pub mod id;
pub mod money;

pub use error::{EngineError, EngineResult};
pub use id::{LineKey, RecordId, TenantId};
pub use money::{round_cost, round_money};

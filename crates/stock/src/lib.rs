//! `fulcrum-stock` — append-only stock ledger and reconciliation.
//!
//! The `stock_movements` collection is the system of record for quantity;
//! `catalog_items.stock_quantity` is a materialized cache that
//! [`StockLedger::reconcile`] can always rebuild from the movement log.

pub mod ledger;
pub mod movement;

pub use ledger::{Correction, ReconcileReport, StockLedger};
pub use movement::{MovementLinks, MovementType, StockMovement};

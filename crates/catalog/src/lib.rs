//! `fulcrum-catalog` — catalog item model and read-side services.
//!
//! The catalog is owned by its own subsystem; this engine reads item
//! definitions in batch and is the sole writer of exactly two fields:
//! `stock_quantity` (stock ledger) and `average_cost` (cost engine).

pub mod composition;
pub mod item;
pub mod resolver;

pub use composition::{ComponentLine, CompositionExpander, StaticExpander};
pub use item::{CatalogItem, ItemKind};
pub use resolver::CatalogResolver;

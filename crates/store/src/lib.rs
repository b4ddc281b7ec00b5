//! `fulcrum-store` — the generic record-store boundary.
//!
//! Every persisted record in the engine crosses this boundary as a JSON
//! document in a named collection, scoped by tenant through ordinary field
//! filters. The trait is the narrow seam to whatever remote CRUD transport
//! backs the deployment; the in-memory implementation backs tests and dev.

pub mod filter;
pub mod memory;
pub mod record;

pub use filter::{Filter, FilterOp};
pub use memory::InMemoryRecordStore;
pub use record::{Record, RecordStore, fetch, fetch_one, insert, insert_batch};

/// Collection names used by the engine.
pub mod collections {
    pub const CATALOG_ITEMS: &str = "catalog_items";
    pub const ORDERS: &str = "orders";
    pub const ORDER_LINES: &str = "order_lines";
    pub const STOCK_MOVEMENTS: &str = "stock_movements";
    pub const COST_HISTORY: &str = "cost_history";

    // Financial collections the engine hands off to (best-effort writes).
    pub const INVOICES: &str = "invoices";
    pub const INVOICE_LINES: &str = "invoice_lines";
    pub const RECEIVABLES: &str = "receivables";
    pub const PAYMENTS: &str = "payments";
    pub const PARTNER_EARNINGS: &str = "partner_earnings";
    pub const PAYABLES: &str = "payables";
}

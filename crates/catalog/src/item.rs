//! Catalog item record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fulcrum_core::{RecordId, TenantId};

/// What a catalog item fundamentally is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Product,
    Service,
}

/// A catalog item as persisted in the `catalog_items` collection.
///
/// Read-only to this engine except for `stock_quantity` and `average_cost`,
/// which the stock ledger and cost engine respectively overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub name: String,
    pub kind: ItemKind,
    pub track_stock: bool,
    pub requires_separation: bool,
    pub requires_delivery: bool,
    pub requires_scheduling: bool,
    pub is_composition: bool,
    /// Workflow template to instantiate when a scheduled service is sold.
    pub service_type_id: Option<RecordId>,
    pub sell_price: Decimal,
    pub cost_price: Decimal,
    pub average_cost: Decimal,
    /// Cached quantity; the stock ledger is the system of record.
    pub stock_quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Whether a sale of this item produces a stock movement.
    pub fn moves_stock(&self) -> bool {
        self.kind == ItemKind::Product && self.track_stock
    }
}

//! Cost recalculation audit trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fulcrum_core::{RecordId, TenantId};
use fulcrum_stock::MovementType;

/// One immutable entry in the `cost_history` collection, written for every
/// average-cost recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostHistoryEntry {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub item_id: RecordId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub previous_average_cost: Decimal,
    pub new_average_cost: Decimal,
    pub previous_stock_quantity: Decimal,
    pub new_stock_quantity: Decimal,
    pub value_before: Decimal,
    pub value_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

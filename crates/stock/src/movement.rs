//! Stock movement record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fulcrum_core::{RecordId, TenantId};

/// Why a quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,
    Purchase,
    Adjustment,
    Return,
    Transfer,
    Separation,
    Correction,
}

impl MovementType {
    /// Movement types that carry a unit cost and feed the weighted-average
    /// recalculation. Outgoing movements never change average cost.
    pub fn is_cost_bearing(&self) -> bool {
        matches!(self, MovementType::Purchase | MovementType::Return)
    }
}

/// Optional links from a movement back to the operation that caused it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementLinks {
    pub order_id: Option<RecordId>,
    pub order_line_id: Option<RecordId>,
    pub purchase_id: Option<RecordId>,
    pub note: Option<String>,
}

impl MovementLinks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_order(order_id: RecordId, order_line_id: RecordId) -> Self {
        Self {
            order_id: Some(order_id),
            order_line_id: Some(order_line_id),
            ..Self::default()
        }
    }

    pub fn for_purchase(purchase_id: RecordId) -> Self {
        Self {
            purchase_id: Some(purchase_id),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// One immutable entry in the append-only stock ledger.
///
/// `previous_quantity`/`new_quantity` are captured at write time so each
/// entry is auditable on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub item_id: RecordId,
    pub movement_type: MovementType,
    /// Signed quantity: negative for outgoing, positive for incoming.
    pub quantity: Decimal,
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    #[serde(flatten)]
    pub links: MovementLinks,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_purchase_and_return_bear_cost() {
        assert!(MovementType::Purchase.is_cost_bearing());
        assert!(MovementType::Return.is_cost_bearing());
        for t in [
            MovementType::Sale,
            MovementType::Adjustment,
            MovementType::Transfer,
            MovementType::Separation,
            MovementType::Correction,
        ] {
            assert!(!t.is_cost_bearing());
        }
    }

    #[test]
    fn movement_type_serializes_snake_case() {
        assert_eq!(serde_json::to_value(MovementType::Sale).unwrap(), "sale");
        assert_eq!(serde_json::to_value(MovementType::Return).unwrap(), "return");
    }
}

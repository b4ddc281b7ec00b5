//! Cost valuation engine: applies incoming movements to catalog items.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use fulcrum_catalog::CatalogItem;
use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};
use fulcrum_store::{Filter, RecordStore, collections, fetch_one, insert};
use fulcrum_stock::StockMovement;

use crate::average::apply_incoming;
use crate::history::CostHistoryEntry;

/// Applies the weighted-average recalculation for incoming movements and
/// maintains the audit trail.
///
/// The engine is invoked explicitly by purchase receiving; cancellation
/// returns restore quantity through the ledger without ever reaching here,
/// so book cost is insulated from reversals.
#[derive(Clone)]
pub struct CostEngine {
    store: Arc<dyn RecordStore>,
}

impl CostEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Recalculate an item's average cost from an already-recorded incoming
    /// movement.
    ///
    /// The movement's captured `previous_quantity` is the blend basis, so the
    /// calculation stays correct even though the ledger has already refreshed
    /// the cached quantity.
    pub async fn apply_incoming_movement(
        &self,
        tenant_id: TenantId,
        movement: &StockMovement,
        unit_cost: Decimal,
    ) -> EngineResult<CostHistoryEntry> {
        if !movement.movement_type.is_cost_bearing() {
            return Err(EngineError::invariant(format!(
                "movement type {:?} does not bear cost",
                movement.movement_type
            )));
        }
        if movement.quantity <= Decimal::ZERO {
            return Err(EngineError::validation(
                "cost-bearing movement quantity must be positive",
            ));
        }
        if unit_cost < Decimal::ZERO {
            return Err(EngineError::validation("unit cost cannot be negative"));
        }

        let item: CatalogItem = fetch_one(
            self.store.as_ref(),
            collections::CATALOG_ITEMS,
            &[Filter::tenant(tenant_id), Filter::id_eq(movement.item_id)],
        )
        .await?
        .ok_or_else(|| EngineError::not_found(format!("catalog item {}", movement.item_id)))?;

        let applied = apply_incoming(
            movement.previous_quantity,
            item.average_cost,
            movement.quantity,
            unit_cost,
        );

        let mut entry = CostHistoryEntry {
            id: RecordId::new(),
            tenant_id,
            item_id: movement.item_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            unit_cost,
            previous_average_cost: item.average_cost,
            new_average_cost: applied.new_average_cost,
            previous_stock_quantity: movement.previous_quantity,
            new_stock_quantity: applied.new_quantity,
            value_before: applied.value_before,
            value_after: applied.value_after,
            occurred_at: Utc::now(),
        };
        entry.id = insert(self.store.as_ref(), collections::COST_HISTORY, &entry).await?;

        self.store
            .update(
                collections::CATALOG_ITEMS,
                movement.item_id,
                json!({ "average_cost": applied.new_average_cost, "updated_at": Utc::now() }),
            )
            .await?;

        info!(
            %tenant_id,
            item_id = %movement.item_id,
            previous_average = %entry.previous_average_cost,
            new_average = %entry.new_average_cost,
            "average cost recalculated"
        );
        Ok(entry)
    }
}

//! Stock ledger service: movement recording and cache reconciliation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::{info, warn};

use fulcrum_catalog::CatalogItem;
use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};
use fulcrum_store::{Filter, RecordStore, collections, fetch, fetch_one, insert};

use crate::movement::{MovementLinks, MovementType, StockMovement};

/// Cache drift below this threshold is ignored by reconciliation.
const DRIFT_TOLERANCE: Decimal = dec!(0.001);

/// A cache correction applied by [`StockLedger::reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub item_id: RecordId,
    pub cached: Decimal,
    pub computed: Decimal,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub items_checked: usize,
    pub corrections: Vec<Correction>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty()
    }
}

/// Append-only stock ledger over the record store.
///
/// The cached-quantity read-modify-write is not atomic at the store, so the
/// ledger serializes movements per `(tenant, item)` behind an async mutex.
/// Reconciliation remains the safety net for drift introduced outside this
/// process, not a substitute for the serialization.
pub struct StockLedger {
    store: Arc<dyn RecordStore>,
    gates: Mutex<HashMap<(TenantId, RecordId), Arc<tokio::sync::Mutex<()>>>>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn gate(&self, tenant_id: TenantId, item_id: RecordId) -> EngineResult<Arc<tokio::sync::Mutex<()>>> {
        let mut gates = self
            .gates
            .lock()
            .map_err(|_| EngineError::store("ledger gate lock poisoned"))?;
        // Drop gates nobody holds so the map stays bounded by the number of
        // items currently in flight, not the number ever touched.
        gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        Ok(gates.entry((tenant_id, item_id)).or_default().clone())
    }

    async fn load_item(&self, tenant_id: TenantId, item_id: RecordId) -> EngineResult<CatalogItem> {
        fetch_one(
            self.store.as_ref(),
            collections::CATALOG_ITEMS,
            &[Filter::tenant(tenant_id), Filter::id_eq(item_id)],
        )
        .await?
        .ok_or_else(|| EngineError::not_found(format!("catalog item {item_id}")))
    }

    /// Record a signed movement against an item and refresh the cached
    /// quantity.
    ///
    /// Missing items are a hard failure: a sale against a nonexistent item
    /// must not proceed.
    pub async fn record_movement(
        &self,
        tenant_id: TenantId,
        item_id: RecordId,
        movement_type: MovementType,
        quantity: Decimal,
        links: MovementLinks,
    ) -> EngineResult<StockMovement> {
        let gate = self.gate(tenant_id, item_id)?;
        let _guard = gate.lock().await;

        let item = self.load_item(tenant_id, item_id).await?;
        let previous_quantity = item.stock_quantity;
        let new_quantity = previous_quantity + quantity;

        let mut movement = StockMovement {
            id: RecordId::new(),
            tenant_id,
            item_id,
            movement_type,
            quantity,
            previous_quantity,
            new_quantity,
            links,
            occurred_at: Utc::now(),
        };
        movement.id = insert(self.store.as_ref(), collections::STOCK_MOVEMENTS, &movement).await?;

        self.store
            .update(
                collections::CATALOG_ITEMS,
                item_id,
                json!({ "stock_quantity": new_quantity, "updated_at": Utc::now() }),
            )
            .await?;

        info!(
            %tenant_id,
            %item_id,
            ?movement_type,
            %quantity,
            %new_quantity,
            "stock movement recorded"
        );
        Ok(movement)
    }

    /// Sum every movement of an item. Ledger truth, ignoring the cache.
    pub async fn computed_quantity(
        &self,
        tenant_id: TenantId,
        item_id: RecordId,
    ) -> EngineResult<Decimal> {
        let movements: Vec<StockMovement> = fetch(
            self.store.as_ref(),
            collections::STOCK_MOVEMENTS,
            &[Filter::tenant(tenant_id), Filter::ref_eq("item_id", item_id)],
        )
        .await?;
        Ok(movements.iter().map(|m| m.quantity).sum())
    }

    /// Rebuild cached quantities from the movement log.
    ///
    /// For every stock-tracked item, the movement sum is compared to the
    /// cache; drift beyond the tolerance overwrites the cache and counts as
    /// a correction. Idempotent: a second pass over unchanged data reports
    /// nothing.
    pub async fn reconcile(&self, tenant_id: TenantId) -> EngineResult<ReconcileReport> {
        let items: Vec<CatalogItem> = fetch(
            self.store.as_ref(),
            collections::CATALOG_ITEMS,
            &[Filter::tenant(tenant_id), Filter::eq("track_stock", true)],
        )
        .await?;

        let mut report = ReconcileReport {
            items_checked: items.len(),
            corrections: Vec::new(),
        };

        for item in items {
            let gate = self.gate(tenant_id, item.id)?;
            let _guard = gate.lock().await;

            let computed = self.computed_quantity(tenant_id, item.id).await?;
            // Re-read under the gate; `items` may be stale by now.
            let cached = self.load_item(tenant_id, item.id).await?.stock_quantity;

            if (computed - cached).abs() > DRIFT_TOLERANCE {
                warn!(
                    %tenant_id,
                    item_id = %item.id,
                    %cached,
                    %computed,
                    "stock cache drift corrected"
                );
                self.store
                    .update(
                        collections::CATALOG_ITEMS,
                        item.id,
                        json!({ "stock_quantity": computed, "updated_at": Utc::now() }),
                    )
                    .await?;
                report.corrections.push(Correction {
                    item_id: item.id,
                    cached,
                    computed,
                });
            }
        }

        Ok(report)
    }
}

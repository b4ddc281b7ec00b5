//! Purchase receipt processing.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use fulcrum_catalog::CatalogResolver;
use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};
use fulcrum_costing::{CostEngine, CostHistoryEntry};
use fulcrum_finance::{FinancialLedger, SideEffectReport, SideEffectStep};
use fulcrum_stock::{MovementLinks, MovementType, StockLedger, StockMovement};
use fulcrum_store::RecordStore;

/// One received line of a purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLine {
    pub item_id: RecordId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// What a processed receipt produced.
#[derive(Debug)]
pub struct ReceiptOutcome {
    pub movements: Vec<StockMovement>,
    pub cost_entries: Vec<CostHistoryEntry>,
    pub side_effects: SideEffectReport,
}

/// Receives purchases: stock in, average cost up, payable out.
pub struct PurchasingEngine {
    resolver: CatalogResolver,
    ledger: Arc<StockLedger>,
    costing: CostEngine,
    financial: Arc<dyn FinancialLedger>,
}

impl PurchasingEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Arc<StockLedger>,
        financial: Arc<dyn FinancialLedger>,
    ) -> Self {
        Self {
            resolver: CatalogResolver::new(store.clone()),
            ledger,
            costing: CostEngine::new(store),
            financial,
        }
    }

    /// Process a full receipt.
    ///
    /// Every line is validated up front; a bad line rejects the whole
    /// receipt before any stock moves. Non-stocked items are skipped with a
    /// warning. The payable is best-effort and never unwinds the receipt.
    pub async fn receive(
        &self,
        tenant_id: TenantId,
        purchase_id: RecordId,
        lines: &[ReceiptLine],
    ) -> EngineResult<ReceiptOutcome> {
        if lines.is_empty() {
            return Err(EngineError::validation("receipt has no lines"));
        }
        for line in lines {
            if line.quantity <= Decimal::ZERO {
                return Err(EngineError::validation(format!(
                    "received quantity must be positive for item {}",
                    line.item_id
                )));
            }
            if line.unit_cost <= Decimal::ZERO {
                return Err(EngineError::validation(format!(
                    "unit cost must be positive for item {}",
                    line.item_id
                )));
            }
        }

        let ids: Vec<RecordId> = lines.iter().map(|l| l.item_id).collect();
        let catalog = self.resolver.resolve(tenant_id, &ids).await?;

        let mut movements = Vec::new();
        let mut cost_entries = Vec::new();
        for line in lines {
            let item = catalog.get(&line.item_id).ok_or_else(|| {
                EngineError::not_found(format!("catalog item {}", line.item_id))
            })?;
            if !item.track_stock {
                warn!(
                    %tenant_id,
                    item_id = %item.id,
                    "received item does not track stock, skipping"
                );
                continue;
            }

            let movement = self
                .ledger
                .record_movement(
                    tenant_id,
                    line.item_id,
                    MovementType::Purchase,
                    line.quantity,
                    MovementLinks::for_purchase(purchase_id),
                )
                .await?;
            let entry = self
                .costing
                .apply_incoming_movement(tenant_id, &movement, line.unit_cost)
                .await?;
            movements.push(movement);
            cost_entries.push(entry);
        }

        let total: Decimal = lines.iter().map(|l| l.quantity * l.unit_cost).sum();
        let mut side_effects = SideEffectReport::new();
        match self
            .financial
            .post_payable(tenant_id, purchase_id, total)
            .await
        {
            Ok(payable_id) => side_effects.ok(SideEffectStep::Payable, Some(payable_id)),
            Err(e) => {
                warn!(%tenant_id, %purchase_id, error = %e, "payable generation failed");
                side_effects.failed(SideEffectStep::Payable, e.to_string());
            }
        }

        info!(
            %tenant_id,
            %purchase_id,
            lines = movements.len(),
            %total,
            "purchase received"
        );
        Ok(ReceiptOutcome {
            movements,
            cost_entries,
            side_effects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fulcrum_catalog::{CatalogItem, ItemKind};
    use fulcrum_finance::{FailingLedger, RecordingLedger};
    use fulcrum_store::{Filter, InMemoryRecordStore, collections, fetch_one, insert};
    use rust_decimal_macros::dec;

    async fn seed_item(
        store: &InMemoryRecordStore,
        tenant_id: TenantId,
        track_stock: bool,
    ) -> RecordId {
        let item = CatalogItem {
            id: RecordId::new(),
            tenant_id,
            name: "Widget".to_string(),
            kind: ItemKind::Product,
            track_stock,
            requires_separation: false,
            requires_delivery: false,
            requires_scheduling: false,
            is_composition: false,
            service_type_id: None,
            sell_price: dec!(10),
            cost_price: dec!(0),
            average_cost: dec!(0),
            stock_quantity: dec!(0),
            updated_at: Utc::now(),
        };
        insert(store, collections::CATALOG_ITEMS, &item).await.unwrap()
    }

    fn engine(store: &Arc<InMemoryRecordStore>) -> PurchasingEngine {
        PurchasingEngine::new(
            store.clone(),
            Arc::new(StockLedger::new(store.clone())),
            Arc::new(RecordingLedger::new()),
        )
    }

    async fn reload(
        store: &InMemoryRecordStore,
        tenant_id: TenantId,
        item_id: RecordId,
    ) -> CatalogItem {
        fetch_one(
            store,
            collections::CATALOG_ITEMS,
            &[Filter::tenant(tenant_id), Filter::id_eq(item_id)],
        )
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn sequential_receipts_blend_the_average() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let item_id = seed_item(&store, tenant_id, true).await;
        let engine = engine(&store);
        let purchase_id = RecordId::new();

        engine
            .receive(
                tenant_id,
                purchase_id,
                &[ReceiptLine {
                    item_id,
                    quantity: dec!(3),
                    unit_cost: dec!(8),
                }],
            )
            .await
            .unwrap();
        let outcome = engine
            .receive(
                tenant_id,
                RecordId::new(),
                &[ReceiptLine {
                    item_id,
                    quantity: dec!(10),
                    unit_cost: dec!(12),
                }],
            )
            .await
            .unwrap();

        // (3×8 + 10×12) / 13
        let item = reload(&store, tenant_id, item_id).await;
        assert_eq!(item.average_cost, dec!(11.0769));
        assert_eq!(item.stock_quantity, dec!(13));
        assert_eq!(outcome.cost_entries.len(), 1);
        assert!(outcome.side_effects.is_clean());
    }

    #[tokio::test]
    async fn non_stocked_lines_are_skipped_but_still_payable() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let stocked = seed_item(&store, tenant_id, true).await;
        let unstocked = seed_item(&store, tenant_id, false).await;
        let engine = engine(&store);

        let outcome = engine
            .receive(
                tenant_id,
                RecordId::new(),
                &[
                    ReceiptLine {
                        item_id: stocked,
                        quantity: dec!(2),
                        unit_cost: dec!(5),
                    },
                    ReceiptLine {
                        item_id: unstocked,
                        quantity: dec!(1),
                        unit_cost: dec!(7),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.movements.len(), 1);
        // The payable still covers the whole receipt.
        let payable = outcome
            .side_effects
            .steps
            .iter()
            .find(|s| s.step == SideEffectStep::Payable)
            .unwrap();
        assert!(payable.result.is_ok());
    }

    #[tokio::test]
    async fn invalid_lines_reject_the_receipt_before_any_movement() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let item_id = seed_item(&store, tenant_id, true).await;
        let engine = engine(&store);

        let err = engine
            .receive(
                tenant_id,
                RecordId::new(),
                &[
                    ReceiptLine {
                        item_id,
                        quantity: dec!(5),
                        unit_cost: dec!(4),
                    },
                    ReceiptLine {
                        item_id,
                        quantity: dec!(0),
                        unit_cost: dec!(4),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let item = reload(&store, tenant_id, item_id).await;
        assert_eq!(item.stock_quantity, dec!(0));
    }

    #[tokio::test]
    async fn payable_failure_does_not_unwind_the_receipt() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let item_id = seed_item(&store, tenant_id, true).await;
        let engine = PurchasingEngine::new(
            store.clone(),
            Arc::new(StockLedger::new(store.clone())),
            Arc::new(FailingLedger),
        );

        let outcome = engine
            .receive(
                tenant_id,
                RecordId::new(),
                &[ReceiptLine {
                    item_id,
                    quantity: dec!(4),
                    unit_cost: dec!(6),
                }],
            )
            .await
            .unwrap();

        assert!(!outcome.side_effects.is_clean());
        let item = reload(&store, tenant_id, item_id).await;
        assert_eq!(item.stock_quantity, dec!(4));
        assert_eq!(item.average_cost, dec!(6.0000));
    }
}

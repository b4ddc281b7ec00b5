//! Order cancellation: stock reversal, status propagation, financial void.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};
use fulcrum_finance::{FinancialLedger, SideEffectReport, SideEffectStep};
use fulcrum_stock::{MovementLinks, MovementType, StockLedger, StockMovement};
use fulcrum_store::{Filter, RecordStore, collections, fetch, fetch_one};

use crate::order::{
    DeliveryStatus, FulfillmentStatus, Order, OrderLine, OrderStatus, SeparationStatus,
};

/// Result of a cancellation: the updated order plus the outcome of every
/// best-effort step.
#[derive(Debug)]
pub struct CancellationOutcome {
    pub order: Order,
    pub side_effects: SideEffectReport,
}

/// Reverses an order: restores stock, cancels lines, voids financials.
///
/// Reversal restores *quantity only*. The return movement leaves the item's
/// average cost untouched, so cancelling a sale never moves book cost.
pub struct CancellationEngine {
    store: Arc<dyn RecordStore>,
    ledger: Arc<StockLedger>,
    financial: Arc<dyn FinancialLedger>,
}

impl CancellationEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Arc<StockLedger>,
        financial: Arc<dyn FinancialLedger>,
    ) -> Self {
        Self {
            store,
            ledger,
            financial,
        }
    }

    pub async fn cancel(
        &self,
        tenant_id: TenantId,
        order_id: RecordId,
        reason: impl Into<String>,
    ) -> EngineResult<CancellationOutcome> {
        let order: Order = fetch_one(
            self.store.as_ref(),
            collections::ORDERS,
            &[Filter::tenant(tenant_id), Filter::id_eq(order_id)],
        )
        .await?
        .ok_or_else(|| EngineError::not_found(format!("order {order_id}")))?;
        if order.status == OrderStatus::Cancelled {
            return Err(EngineError::conflict(format!(
                "order {order_id} is already cancelled"
            )));
        }

        let lines: Vec<OrderLine> = fetch(
            self.store.as_ref(),
            collections::ORDER_LINES,
            &[
                Filter::tenant(tenant_id),
                Filter::ref_eq("order_id", order_id),
            ],
        )
        .await?;

        for line in &lines {
            if !line.is_composition_parent && line.track_stock {
                self.reverse_line_stock(tenant_id, order_id, line).await?;
            }
            self.cancel_line(line).await?;
        }

        let reason = reason.into();
        self.store
            .update(
                collections::ORDERS,
                order_id,
                json!({
                    "status": OrderStatus::Cancelled,
                    "pending_products": false,
                    "pending_services": false,
                    "cancellation_reason": reason,
                }),
            )
            .await?;
        info!(%tenant_id, %order_id, "order cancelled");

        let mut side_effects = SideEffectReport::new();
        match self.financial.void_sale(tenant_id, order_id).await {
            Ok(()) => side_effects.ok(SideEffectStep::VoidInvoice, None),
            Err(e) => {
                warn!(%tenant_id, %order_id, error = %e, "financial void failed");
                side_effects.failed(SideEffectStep::VoidInvoice, e.to_string());
            }
        }

        let mut order = order;
        order.status = OrderStatus::Cancelled;
        order.pending_products = false;
        order.pending_services = false;
        order.cancellation_reason = Some(reason);

        Ok(CancellationOutcome {
            order,
            side_effects,
        })
    }

    /// Put back exactly what the sale took out, per the movement ledger.
    async fn reverse_line_stock(
        &self,
        tenant_id: TenantId,
        order_id: RecordId,
        line: &OrderLine,
    ) -> EngineResult<()> {
        let sales: Vec<StockMovement> = fetch(
            self.store.as_ref(),
            collections::STOCK_MOVEMENTS,
            &[
                Filter::tenant(tenant_id),
                Filter::ref_eq("order_line_id", line.id),
                Filter::eq("movement_type", json!(MovementType::Sale)),
            ],
        )
        .await?;
        let sold: Decimal = sales.iter().map(|m| m.quantity).sum();
        if sold >= Decimal::ZERO {
            // Nothing was ever deducted for this line.
            return Ok(());
        }

        self.ledger
            .record_movement(
                tenant_id,
                line.item_id,
                MovementType::Return,
                -sold,
                MovementLinks::for_order(order_id, line.id).with_note("order cancellation"),
            )
            .await?;
        Ok(())
    }

    async fn cancel_line(&self, line: &OrderLine) -> EngineResult<()> {
        let separation = match line.separation_status {
            SeparationStatus::NotRequired => SeparationStatus::NotRequired,
            _ => SeparationStatus::Cancelled,
        };
        let delivery = match line.delivery_status {
            DeliveryStatus::NotRequired => DeliveryStatus::NotRequired,
            _ => DeliveryStatus::Cancelled,
        };
        self.store
            .update(
                collections::ORDER_LINES,
                line.id,
                json!({
                    "separation_status": separation,
                    "delivery_status": delivery,
                    "fulfillment_status": FulfillmentStatus::Cancelled,
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fulcrum_catalog::{CatalogItem, ItemKind};
    use fulcrum_finance::RecordingLedger;
    use fulcrum_store::{InMemoryRecordStore, insert};
    use rust_decimal_macros::dec;

    async fn seed_item(store: &InMemoryRecordStore, tenant_id: TenantId) -> CatalogItem {
        let mut item = CatalogItem {
            id: RecordId::new(),
            tenant_id,
            name: "Widget".to_string(),
            kind: ItemKind::Product,
            track_stock: true,
            requires_separation: false,
            requires_delivery: false,
            requires_scheduling: false,
            is_composition: false,
            service_type_id: None,
            sell_price: dec!(10),
            cost_price: dec!(4),
            average_cost: dec!(4.5),
            stock_quantity: dec!(8),
            updated_at: Utc::now(),
        };
        item.id = insert(store, collections::CATALOG_ITEMS, &item).await.unwrap();
        item
    }

    async fn seed_order(store: &InMemoryRecordStore, tenant_id: TenantId) -> Order {
        let mut order = Order {
            id: RecordId::new(),
            tenant_id,
            customer_id: RecordId::new(),
            partner_id: None,
            subtotal: dec!(20),
            discount: dec!(0),
            tax: dec!(0),
            total: dec!(20),
            status: OrderStatus::Open,
            payment_method: "cash".to_string(),
            pending_products: true,
            pending_services: false,
            cancellation_reason: None,
            created_at: Utc::now(),
        };
        order.id = insert(store, collections::ORDERS, &order).await.unwrap();
        order
    }

    async fn seed_line(
        store: &InMemoryRecordStore,
        order: &Order,
        item: &CatalogItem,
        quantity: Decimal,
    ) -> OrderLine {
        let mut line = OrderLine {
            id: RecordId::new(),
            tenant_id: order.tenant_id,
            order_id: order.id,
            item_id: item.id,
            kind: ItemKind::Product,
            description: item.name.clone(),
            quantity,
            unit_price: dec!(10),
            cost_price: dec!(4.5),
            discount: dec!(0),
            subtotal: dec!(20),
            track_stock: true,
            requires_scheduling: false,
            separation_status: SeparationStatus::Pending,
            delivery_status: DeliveryStatus::NotRequired,
            fulfillment_status: FulfillmentStatus::Pending,
            parent_line_id: None,
            is_composition_parent: false,
            service_type_id: None,
            appointment_id: None,
            process_instance_id: None,
        };
        line.id = insert(store, collections::ORDER_LINES, &line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn cancellation_restores_stock_without_touching_average_cost() {
        let store = std::sync::Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let item = seed_item(&store, tenant_id).await;
        let order = seed_order(&store, tenant_id).await;
        let line = seed_line(&store, &order, &item, dec!(2)).await;

        let ledger = Arc::new(StockLedger::new(store.clone()));
        ledger
            .record_movement(
                tenant_id,
                item.id,
                MovementType::Sale,
                dec!(-2),
                MovementLinks::for_order(order.id, line.id),
            )
            .await
            .unwrap();

        let engine = CancellationEngine::new(
            store.clone(),
            ledger.clone(),
            Arc::new(RecordingLedger::new()),
        );
        let outcome = engine.cancel(tenant_id, order.id, "customer regret").await.unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Cancelled);
        assert!(outcome.side_effects.is_clean());

        let item_after: CatalogItem = fetch_one(
            store.as_ref(),
            collections::CATALOG_ITEMS,
            &[Filter::tenant(tenant_id), Filter::id_eq(item.id)],
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(item_after.stock_quantity, dec!(8));
        assert_eq!(item_after.average_cost, dec!(4.5));

        let line_after: OrderLine = fetch_one(
            store.as_ref(),
            collections::ORDER_LINES,
            &[Filter::tenant(tenant_id), Filter::id_eq(line.id)],
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(line_after.separation_status, SeparationStatus::Cancelled);
        assert_eq!(line_after.delivery_status, DeliveryStatus::NotRequired);
        assert_eq!(line_after.fulfillment_status, FulfillmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn double_cancellation_is_a_conflict() {
        let store = std::sync::Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let order = seed_order(&store, tenant_id).await;

        let engine = CancellationEngine::new(
            store.clone(),
            Arc::new(StockLedger::new(store.clone())),
            Arc::new(RecordingLedger::new()),
        );
        engine.cancel(tenant_id, order.id, "first").await.unwrap();
        let err = engine.cancel(tenant_id, order.id, "second").await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn void_failure_is_reported_not_propagated() {
        let store = std::sync::Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let order = seed_order(&store, tenant_id).await;

        let engine = CancellationEngine::new(
            store.clone(),
            Arc::new(StockLedger::new(store.clone())),
            Arc::new(fulcrum_finance::FailingLedger),
        );
        let outcome = engine.cancel(tenant_id, order.id, "oops").await.unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Cancelled);
        assert!(!outcome.side_effects.is_clean());
        assert_eq!(outcome.side_effects.failures().count(), 1);
    }
}

//! Order builder: in-memory draft graph, committed in topological order.
//!
//! Lines get stable synthetic keys before any remote call; parent→child
//! linkage is resolved through a key→id map once the store has issued real
//! ids. This replaces positional correlation across asynchronous steps.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::warn;

use fulcrum_catalog::{CatalogResolver, CompositionExpander, ItemKind};
use fulcrum_core::{EngineError, EngineResult, LineKey, RecordId, TenantId, round_money};
use fulcrum_store::{RecordStore, collections, insert, insert_batch};

use crate::classifier::classify_line;
use crate::order::{FulfillmentStatus, Order, OrderLine, OrderStatus};

/// Order-level discount: an explicit amount wins over a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DiscountSpec {
    #[default]
    None,
    Amount(Decimal),
    Percent(Decimal),
}

/// One requested item at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemRequest {
    pub item_id: RecordId,
    pub quantity: Decimal,
    /// Overrides the catalog sell price when present (kit bundle pricing).
    pub unit_price: Option<Decimal>,
    pub discount: Option<Decimal>,
}

/// Checkout input.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderRequest {
    pub customer_id: RecordId,
    pub partner_id: Option<RecordId>,
    pub partner_commission_percent: Option<Decimal>,
    pub payment_method: String,
    pub discount: DiscountSpec,
    pub items: Vec<OrderItemRequest>,
}

/// A not-yet-persisted order line, keyed synthetically.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftLine {
    pub key: LineKey,
    pub parent_key: Option<LineKey>,
    pub item_id: RecordId,
    pub kind: ItemKind,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub track_stock: bool,
    pub requires_scheduling: bool,
    pub is_composition_parent: bool,
    pub service_type_id: Option<RecordId>,
    pub separation_status: crate::order::SeparationStatus,
    pub delivery_status: crate::order::DeliveryStatus,
    pub fulfillment_status: FulfillmentStatus,
}

/// The fully computed order graph, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftOrder {
    pub customer_id: RecordId,
    pub partner_id: Option<RecordId>,
    pub partner_commission_percent: Option<Decimal>,
    pub payment_method: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub pending_products: bool,
    pub pending_services: bool,
    pub lines: Vec<DraftLine>,
}

fn line_subtotal(unit_price: Decimal, quantity: Decimal, discount: Decimal) -> Decimal {
    round_money(unit_price * quantity - discount)
}

/// Build the in-memory order graph from a checkout request.
///
/// All referenced items are resolved in one batch; ids the catalog does not
/// know for this tenant are dropped with a warning rather than failing the
/// order. Composition items are exploded through the external expander, the
/// parent kept as a synthetic display line with zero cost and no flags.
pub async fn build_draft(
    resolver: &CatalogResolver,
    expander: &dyn CompositionExpander,
    tenant_id: TenantId,
    request: &CreateOrderRequest,
) -> EngineResult<DraftOrder> {
    let ids: Vec<RecordId> = request.items.iter().map(|i| i.item_id).collect();
    let catalog = resolver.resolve(tenant_id, &ids).await?;

    let mut lines: Vec<DraftLine> = Vec::new();
    let mut next_key = 0u32;
    let mut key = || {
        let k = LineKey(next_key);
        next_key += 1;
        k
    };

    for item_request in &request.items {
        let Some(item) = catalog.get(&item_request.item_id) else {
            warn!(
                %tenant_id,
                item_id = %item_request.item_id,
                "requested item not in catalog, dropping line"
            );
            continue;
        };
        if item_request.quantity <= Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "quantity must be positive for item {}",
                item.id
            )));
        }

        let unit_price = item_request.unit_price.unwrap_or(item.sell_price);
        let discount = item_request.discount.unwrap_or(Decimal::ZERO);
        if discount < Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "discount cannot be negative for item {}",
                item.id
            )));
        }

        if item.is_composition {
            let parent_key = key();
            let classification = classify_line(item.kind, false, false, false, true);
            lines.push(DraftLine {
                key: parent_key,
                parent_key: None,
                item_id: item.id,
                kind: item.kind,
                description: item.name.clone(),
                quantity: item_request.quantity,
                unit_price,
                // Synthetic display line: no cost, no commission basis.
                cost_price: Decimal::ZERO,
                discount,
                subtotal: line_subtotal(unit_price, item_request.quantity, discount),
                track_stock: false,
                requires_scheduling: false,
                is_composition_parent: true,
                service_type_id: None,
                separation_status: classification.separation_status,
                delivery_status: classification.delivery_status,
                fulfillment_status: classification.fulfillment_status,
            });

            let components = expander
                .explode(tenant_id, item.id, item_request.quantity)
                .await?;
            for component in components {
                let classification = classify_line(
                    component.kind,
                    component.requires_separation,
                    component.requires_delivery,
                    component.requires_scheduling,
                    false,
                );
                lines.push(DraftLine {
                    key: key(),
                    parent_key: Some(parent_key),
                    item_id: component.item_id,
                    kind: component.kind,
                    description: component.name.clone(),
                    quantity: component.quantity,
                    unit_price: component.sell_price,
                    cost_price: component.cost_price,
                    discount: Decimal::ZERO,
                    subtotal: line_subtotal(component.sell_price, component.quantity, Decimal::ZERO),
                    track_stock: component.track_stock,
                    requires_scheduling: component.requires_scheduling,
                    is_composition_parent: false,
                    service_type_id: None,
                    separation_status: classification.separation_status,
                    delivery_status: classification.delivery_status,
                    fulfillment_status: classification.fulfillment_status,
                });
            }
        } else {
            let classification = classify_line(
                item.kind,
                item.requires_separation,
                item.requires_delivery,
                item.requires_scheduling,
                false,
            );
            // Margin snapshot: current average when the item has cost history,
            // otherwise the catalog cost price.
            let cost_price = if item.average_cost > Decimal::ZERO {
                item.average_cost
            } else {
                item.cost_price
            };
            lines.push(DraftLine {
                key: key(),
                parent_key: None,
                item_id: item.id,
                kind: item.kind,
                description: item.name.clone(),
                quantity: item_request.quantity,
                unit_price,
                cost_price,
                discount,
                subtotal: line_subtotal(unit_price, item_request.quantity, discount),
                track_stock: item.moves_stock(),
                requires_scheduling: item.requires_scheduling,
                is_composition_parent: false,
                service_type_id: item.service_type_id,
                separation_status: classification.separation_status,
                delivery_status: classification.delivery_status,
                fulfillment_status: classification.fulfillment_status,
            });
        }
    }

    if lines.is_empty() {
        return Err(EngineError::validation("order has no resolvable lines"));
    }

    // Kit price override: an explicit bundle price on the parent lines wins
    // over the sum of the components.
    let child_sum: Decimal = lines
        .iter()
        .filter(|l| !l.is_composition_parent)
        .map(|l| l.subtotal)
        .sum();
    let parent_sum: Decimal = lines
        .iter()
        .filter(|l| l.is_composition_parent)
        .map(|l| l.subtotal)
        .sum();
    let subtotal = if parent_sum > Decimal::ZERO {
        parent_sum
    } else {
        child_sum
    };

    let discount_amount = match request.discount {
        DiscountSpec::None => Decimal::ZERO,
        DiscountSpec::Amount(amount) if amount < Decimal::ZERO => {
            return Err(EngineError::validation("order discount cannot be negative"));
        }
        DiscountSpec::Amount(amount) => amount,
        DiscountSpec::Percent(percent) if percent < Decimal::ZERO => {
            return Err(EngineError::validation("order discount cannot be negative"));
        }
        DiscountSpec::Percent(percent) => round_money(subtotal * percent / Decimal::ONE_HUNDRED),
    };
    let total = round_money((subtotal - discount_amount).max(Decimal::ZERO));

    let pending_products = lines.iter().any(|l| {
        !l.is_composition_parent
            && l.kind == ItemKind::Product
            && l.fulfillment_status == FulfillmentStatus::Pending
    });
    let pending_services = lines.iter().any(|l| {
        !l.is_composition_parent
            && l.kind == ItemKind::Service
            && l.fulfillment_status == FulfillmentStatus::Pending
    });

    Ok(DraftOrder {
        customer_id: request.customer_id,
        partner_id: request.partner_id,
        partner_commission_percent: request.partner_commission_percent,
        payment_method: request.payment_method.clone(),
        subtotal: round_money(subtotal),
        discount_amount: round_money(discount_amount),
        total,
        pending_products,
        pending_services,
        lines,
    })
}

impl DraftOrder {
    /// Commit the graph: order header first, then every line in input order
    /// through one batch create, then parent links patched from the
    /// key→id map.
    pub async fn commit(
        &self,
        store: &dyn RecordStore,
        tenant_id: TenantId,
    ) -> EngineResult<(Order, Vec<OrderLine>)> {
        let mut order = Order {
            id: RecordId::new(),
            tenant_id,
            customer_id: self.customer_id,
            partner_id: self.partner_id,
            subtotal: self.subtotal,
            discount: self.discount_amount,
            // Tax field persisted but never computed today.
            tax: Decimal::ZERO,
            total: self.total,
            status: OrderStatus::Open,
            payment_method: self.payment_method.clone(),
            pending_products: self.pending_products,
            pending_services: self.pending_services,
            cancellation_reason: None,
            created_at: Utc::now(),
        };
        order.id = insert(store, collections::ORDERS, &order).await?;

        let mut order_lines: Vec<OrderLine> = self
            .lines
            .iter()
            .map(|draft| OrderLine {
                id: RecordId::new(),
                tenant_id,
                order_id: order.id,
                item_id: draft.item_id,
                kind: draft.kind,
                description: draft.description.clone(),
                quantity: draft.quantity,
                unit_price: draft.unit_price,
                cost_price: draft.cost_price,
                discount: draft.discount,
                subtotal: draft.subtotal,
                track_stock: draft.track_stock,
                requires_scheduling: draft.requires_scheduling,
                separation_status: draft.separation_status,
                delivery_status: draft.delivery_status,
                fulfillment_status: draft.fulfillment_status,
                parent_line_id: None,
                is_composition_parent: draft.is_composition_parent,
                service_type_id: draft.service_type_id,
                appointment_id: None,
                process_instance_id: None,
            })
            .collect();

        let ids = insert_batch(store, collections::ORDER_LINES, &order_lines).await?;
        let key_to_id: std::collections::HashMap<LineKey, RecordId> = self
            .lines
            .iter()
            .zip(&ids)
            .map(|(draft, id)| (draft.key, *id))
            .collect();

        for ((draft, line), id) in self.lines.iter().zip(&mut order_lines).zip(&ids) {
            line.id = *id;
            if let Some(parent_key) = draft.parent_key {
                let parent_id = key_to_id.get(&parent_key).copied().ok_or_else(|| {
                    EngineError::invariant(format!("unresolved parent key {parent_key}"))
                })?;
                line.parent_line_id = Some(parent_id);
                store
                    .update(
                        collections::ORDER_LINES,
                        *id,
                        json!({ "parent_line_id": parent_id }),
                    )
                    .await?;
            }
        }

        Ok((order, order_lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fulcrum_catalog::{CatalogItem, ComponentLine, StaticExpander};
    use fulcrum_store::InMemoryRecordStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn item(tenant_id: TenantId, name: &str, sell: Decimal) -> CatalogItem {
        CatalogItem {
            id: RecordId::new(),
            tenant_id,
            name: name.to_string(),
            kind: ItemKind::Product,
            track_stock: true,
            requires_separation: false,
            requires_delivery: false,
            requires_scheduling: false,
            is_composition: false,
            service_type_id: None,
            sell_price: sell,
            cost_price: dec!(1),
            average_cost: dec!(0),
            stock_quantity: dec!(0),
            updated_at: Utc::now(),
        }
    }

    async fn seed(store: &Arc<InMemoryRecordStore>, item: &CatalogItem) -> RecordId {
        insert(store.as_ref(), collections::CATALOG_ITEMS, item)
            .await
            .unwrap()
    }

    fn request(items: Vec<OrderItemRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: RecordId::new(),
            partner_id: None,
            partner_commission_percent: None,
            payment_method: "cash".to_string(),
            discount: DiscountSpec::None,
            items,
        }
    }

    fn component(item_id: RecordId, sell: Decimal, quantity: Decimal) -> ComponentLine {
        ComponentLine {
            item_id,
            name: "Component".to_string(),
            kind: ItemKind::Product,
            quantity,
            sell_price: sell,
            cost_price: dec!(2),
            track_stock: true,
            requires_separation: false,
            requires_delivery: false,
            requires_scheduling: false,
            unit_id: None,
        }
    }

    #[tokio::test]
    async fn unresolved_items_are_dropped_not_fatal() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let known = seed(&store, &item(tenant_id, "Known", dec!(10))).await;
        let resolver = CatalogResolver::new(store.clone());
        let expander = StaticExpander::new();

        let draft = build_draft(
            &resolver,
            &expander,
            tenant_id,
            &request(vec![
                OrderItemRequest {
                    item_id: known,
                    quantity: dec!(2),
                    unit_price: None,
                    discount: None,
                },
                OrderItemRequest {
                    item_id: RecordId::new(),
                    quantity: dec!(1),
                    unit_price: None,
                    discount: None,
                },
            ]),
        )
        .await
        .unwrap();

        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.subtotal, dec!(20.00));
    }

    #[tokio::test]
    async fn all_items_unresolved_is_a_validation_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        let resolver = CatalogResolver::new(store);
        let expander = StaticExpander::new();

        let err = build_draft(
            &resolver,
            &expander,
            TenantId::new(),
            &request(vec![OrderItemRequest {
                item_id: RecordId::new(),
                quantity: dec!(1),
                unit_price: None,
                discount: None,
            }]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn priced_kit_parent_overrides_component_sum() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();

        let mut kit = item(tenant_id, "Kit", dec!(50));
        kit.is_composition = true;
        let kit_id = seed(&store, &kit).await;

        let part_a = seed(&store, &item(tenant_id, "Part A", dec!(40))).await;
        let part_b = seed(&store, &item(tenant_id, "Part B", dec!(20))).await;

        let expander = StaticExpander::new();
        expander.register(
            kit_id,
            vec![component(part_a, dec!(40), dec!(1)), component(part_b, dec!(20), dec!(1))],
        );

        let resolver = CatalogResolver::new(store.clone());
        let draft = build_draft(
            &resolver,
            &expander,
            tenant_id,
            &request(vec![OrderItemRequest {
                item_id: kit_id,
                quantity: dec!(1),
                unit_price: None,
                discount: None,
            }]),
        )
        .await
        .unwrap();

        // Children sum to 60 but the parent carries an explicit 50.
        assert_eq!(draft.lines.len(), 3);
        assert_eq!(draft.subtotal, dec!(50.00));
        assert_eq!(draft.total, dec!(50.00));
    }

    #[tokio::test]
    async fn zero_priced_kit_falls_back_to_component_sum() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();

        let mut kit = item(tenant_id, "Kit", dec!(0));
        kit.is_composition = true;
        let kit_id = seed(&store, &kit).await;
        let part = seed(&store, &item(tenant_id, "Part", dec!(60))).await;

        let expander = StaticExpander::new();
        expander.register(kit_id, vec![component(part, dec!(60), dec!(1))]);

        let resolver = CatalogResolver::new(store.clone());
        let draft = build_draft(
            &resolver,
            &expander,
            tenant_id,
            &request(vec![OrderItemRequest {
                item_id: kit_id,
                quantity: dec!(1),
                unit_price: None,
                discount: None,
            }]),
        )
        .await
        .unwrap();

        assert_eq!(draft.subtotal, dec!(60.00));
    }

    #[tokio::test]
    async fn percent_discount_and_floor_at_zero() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let id = seed(&store, &item(tenant_id, "Widget", dec!(100))).await;
        let resolver = CatalogResolver::new(store.clone());
        let expander = StaticExpander::new();

        let mut req = request(vec![OrderItemRequest {
            item_id: id,
            quantity: dec!(1),
            unit_price: None,
            discount: None,
        }]);
        req.discount = DiscountSpec::Percent(dec!(15));
        let draft = build_draft(&resolver, &expander, tenant_id, &req).await.unwrap();
        assert_eq!(draft.discount_amount, dec!(15.00));
        assert_eq!(draft.total, dec!(85.00));

        req.discount = DiscountSpec::Amount(dec!(150));
        let draft = build_draft(&resolver, &expander, tenant_id, &req).await.unwrap();
        assert_eq!(draft.total, dec!(0.00));
    }

    #[tokio::test]
    async fn negative_discounts_are_rejected() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();
        let id = seed(&store, &item(tenant_id, "Widget", dec!(100))).await;
        let resolver = CatalogResolver::new(store.clone());
        let expander = StaticExpander::new();

        // A negative amount would inflate the total past the subtotal.
        let mut req = request(vec![OrderItemRequest {
            item_id: id,
            quantity: dec!(1),
            unit_price: None,
            discount: None,
        }]);
        req.discount = DiscountSpec::Amount(dec!(-10));
        let err = build_draft(&resolver, &expander, tenant_id, &req).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        req.discount = DiscountSpec::Percent(dec!(-5));
        let err = build_draft(&resolver, &expander, tenant_id, &req).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        req.discount = DiscountSpec::None;
        req.items[0].discount = Some(dec!(-1));
        let err = build_draft(&resolver, &expander, tenant_id, &req).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn commit_links_children_to_store_issued_parent_id() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant_id = TenantId::new();

        let mut kit = item(tenant_id, "Kit", dec!(50));
        kit.is_composition = true;
        let kit_id = seed(&store, &kit).await;
        let part = seed(&store, &item(tenant_id, "Part", dec!(30))).await;

        let expander = StaticExpander::new();
        expander.register(kit_id, vec![component(part, dec!(30), dec!(2))]);

        let resolver = CatalogResolver::new(store.clone());
        let draft = build_draft(
            &resolver,
            &expander,
            tenant_id,
            &request(vec![OrderItemRequest {
                item_id: kit_id,
                quantity: dec!(1),
                unit_price: None,
                discount: None,
            }]),
        )
        .await
        .unwrap();

        let (order, lines) = draft.commit(store.as_ref(), tenant_id).await.unwrap();
        assert_eq!(lines.len(), 2);

        let parent = lines.iter().find(|l| l.is_composition_parent).unwrap();
        let child = lines.iter().find(|l| !l.is_composition_parent).unwrap();
        assert_eq!(child.parent_line_id, Some(parent.id));
        assert_eq!(child.order_id, order.id);

        // The patch must be visible in the store, not just in memory.
        let persisted: Vec<OrderLine> = fulcrum_store::fetch(
            store.as_ref(),
            collections::ORDER_LINES,
            &[fulcrum_store::Filter::tenant(tenant_id)],
        )
        .await
        .unwrap();
        let persisted_child = persisted.iter().find(|l| !l.is_composition_parent).unwrap();
        assert_eq!(persisted_child.parent_line_id, Some(parent.id));
    }
}

//! Line-level fulfillment transitions and order flag convergence.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use fulcrum_core::{EngineError, EngineResult, RecordId, TenantId};
use fulcrum_store::{Filter, RecordStore, collections, fetch, fetch_one};

use crate::classifier::pending_flags;
use crate::order::{
    DeliveryStatus, FulfillmentStatus, Order, OrderLine, OrderStatus, SeparationStatus,
};

/// Drives per-line fulfillment transitions.
///
/// Every transition persists the line, re-evaluates the fulfillment
/// predicate, re-aggregates the composition parent, and recomputes the
/// order's pending flags. Scheduling-required service lines are exempt from
/// predicate auto-completion; they complete only through
/// [`complete_service`](Self::complete_service).
pub struct FulfillmentService {
    store: Arc<dyn RecordStore>,
}

impl FulfillmentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn start_separation(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        match line.separation_status {
            SeparationStatus::Pending => {
                line.separation_status = SeparationStatus::InProgress;
                line.fulfillment_status = FulfillmentStatus::InProgress;
            }
            other => {
                return Err(EngineError::conflict(format!(
                    "cannot start separation from {other:?}"
                )));
            }
        }
        self.refresh(tenant_id, line).await
    }

    pub async fn mark_separation_ready(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        match line.separation_status {
            SeparationStatus::Pending | SeparationStatus::InProgress => {
                line.separation_status = SeparationStatus::Ready;
            }
            other => {
                return Err(EngineError::conflict(format!(
                    "cannot mark separation ready from {other:?}"
                )));
            }
        }
        self.refresh(tenant_id, line).await
    }

    pub async fn mark_delivery_in_transit(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        match line.delivery_status {
            DeliveryStatus::Pending | DeliveryStatus::Failed => {
                line.delivery_status = DeliveryStatus::InTransit;
                line.fulfillment_status = FulfillmentStatus::InProgress;
            }
            other => {
                return Err(EngineError::conflict(format!(
                    "cannot dispatch delivery from {other:?}"
                )));
            }
        }
        self.refresh(tenant_id, line).await
    }

    pub async fn mark_delivered(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        match line.delivery_status {
            DeliveryStatus::Pending | DeliveryStatus::InTransit => {
                line.delivery_status = DeliveryStatus::Delivered;
                if line.separation_status == SeparationStatus::Ready {
                    line.separation_status = SeparationStatus::Delivered;
                }
            }
            other => {
                return Err(EngineError::conflict(format!(
                    "cannot mark delivered from {other:?}"
                )));
            }
        }
        self.refresh(tenant_id, line).await
    }

    pub async fn mark_delivery_failed(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        match line.delivery_status {
            DeliveryStatus::InTransit => {
                line.delivery_status = DeliveryStatus::Failed;
            }
            other => {
                return Err(EngineError::conflict(format!(
                    "cannot fail delivery from {other:?}"
                )));
            }
        }
        self.refresh(tenant_id, line).await
    }

    /// Store the booked appointment on a service line. Does not complete the
    /// line; the service still has to be performed.
    pub async fn link_appointment(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
        appointment_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        if line.kind != fulcrum_catalog::ItemKind::Service || !line.requires_scheduling {
            return Err(EngineError::validation(
                "appointments attach to scheduling-required service lines only",
            ));
        }
        line.appointment_id = Some(appointment_id);
        if line.fulfillment_status == FulfillmentStatus::Pending {
            line.fulfillment_status = FulfillmentStatus::InProgress;
        }
        self.refresh(tenant_id, line).await
    }

    /// Explicit completion for service lines.
    pub async fn complete_service(
        &self,
        tenant_id: TenantId,
        line_id: RecordId,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load_line(tenant_id, line_id).await?;
        if line.kind != fulcrum_catalog::ItemKind::Service {
            return Err(EngineError::validation(
                "complete_service applies to service lines only",
            ));
        }
        if line.fulfillment_status == FulfillmentStatus::Cancelled {
            return Err(EngineError::conflict("line is cancelled"));
        }
        line.fulfillment_status = FulfillmentStatus::Completed;
        self.refresh(tenant_id, line).await
    }

    async fn load_line(&self, tenant_id: TenantId, line_id: RecordId) -> EngineResult<OrderLine> {
        fetch_one(
            self.store.as_ref(),
            collections::ORDER_LINES,
            &[Filter::tenant(tenant_id), Filter::id_eq(line_id)],
        )
        .await?
        .ok_or_else(|| EngineError::not_found(format!("order line {line_id}")))
    }

    /// Persist the transition and converge derived state: line predicate,
    /// parent aggregate, order flags.
    async fn refresh(&self, tenant_id: TenantId, mut line: OrderLine) -> EngineResult<OrderLine> {
        let auto_complete = !line.is_composition_parent
            && !(line.kind == fulcrum_catalog::ItemKind::Service && line.requires_scheduling);
        if auto_complete
            && line.fulfillment_status != FulfillmentStatus::Cancelled
            && line.is_fulfilled()
        {
            line.fulfillment_status = FulfillmentStatus::Completed;
        }

        self.store
            .update(
                collections::ORDER_LINES,
                line.id,
                json!({
                    "separation_status": line.separation_status,
                    "delivery_status": line.delivery_status,
                    "fulfillment_status": line.fulfillment_status,
                    "appointment_id": line.appointment_id,
                }),
            )
            .await?;

        let order_lines: Vec<OrderLine> = fetch(
            self.store.as_ref(),
            collections::ORDER_LINES,
            &[
                Filter::tenant(tenant_id),
                Filter::ref_eq("order_id", line.order_id),
            ],
        )
        .await?;

        if let Some(parent_id) = line.parent_line_id {
            let all_children_done = order_lines
                .iter()
                .filter(|l| l.parent_line_id == Some(parent_id))
                .all(|l| l.fulfillment_status == FulfillmentStatus::Completed);
            let parent_status = if all_children_done {
                FulfillmentStatus::Completed
            } else {
                FulfillmentStatus::InProgress
            };
            self.store
                .update(
                    collections::ORDER_LINES,
                    parent_id,
                    json!({ "fulfillment_status": parent_status }),
                )
                .await?;
        }

        // Re-read so the parent patch is reflected in the flag scan.
        let order_lines: Vec<OrderLine> = fetch(
            self.store.as_ref(),
            collections::ORDER_LINES,
            &[
                Filter::tenant(tenant_id),
                Filter::ref_eq("order_id", line.order_id),
            ],
        )
        .await?;
        let (pending_products, pending_services) = pending_flags(&order_lines);

        let order: Option<Order> = fetch_one(
            self.store.as_ref(),
            collections::ORDERS,
            &[Filter::tenant(tenant_id), Filter::id_eq(line.order_id)],
        )
        .await?;
        let order =
            order.ok_or_else(|| EngineError::not_found(format!("order {}", line.order_id)))?;

        let status = if order.status == OrderStatus::Open && !pending_products && !pending_services
        {
            OrderStatus::Completed
        } else {
            order.status
        };
        self.store
            .update(
                collections::ORDERS,
                order.id,
                json!({
                    "pending_products": pending_products,
                    "pending_services": pending_services,
                    "status": status,
                }),
            )
            .await?;

        if status == OrderStatus::Completed && order.status == OrderStatus::Open {
            info!(%tenant_id, order_id = %order.id, "order fulfilled");
        }

        Ok(line)
    }
}

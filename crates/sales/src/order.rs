//! Order and order-line records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fulcrum_catalog::ItemKind;
use fulcrum_core::{RecordId, TenantId};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Completed,
    Cancelled,
    Refunded,
    PartialRefund,
}

/// Physical picking/packing state of a stocked product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationStatus {
    NotRequired,
    Pending,
    InProgress,
    Ready,
    Delivered,
    Cancelled,
}

/// Delivery state of a product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotRequired,
    Pending,
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

/// Aggregate completion state of a line across its sub-processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// Order header as persisted in the `orders` collection.
///
/// Created once per checkout, mutated by fulfillment and cancellation, never
/// hard-deleted. `tax` is persisted but always zero today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub customer_id: RecordId,
    pub partner_id: Option<RecordId>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: String,
    pub pending_products: bool,
    pub pending_services: bool,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub order_id: RecordId,
    pub item_id: RecordId,
    pub kind: ItemKind,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Snapshot of the item's average cost at sale time (margin accounting).
    pub cost_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub track_stock: bool,
    pub requires_scheduling: bool,
    pub separation_status: SeparationStatus,
    pub delivery_status: DeliveryStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub parent_line_id: Option<RecordId>,
    pub is_composition_parent: bool,
    pub service_type_id: Option<RecordId>,
    pub appointment_id: Option<RecordId>,
    pub process_instance_id: Option<RecordId>,
}

impl OrderLine {
    /// The fulfillment predicate: separation resolved and delivery resolved.
    pub fn is_fulfilled(&self) -> bool {
        matches!(
            self.separation_status,
            SeparationStatus::NotRequired | SeparationStatus::Ready | SeparationStatus::Delivered
        ) && matches!(
            self.delivery_status,
            DeliveryStatus::NotRequired | DeliveryStatus::Delivered
        )
    }

    /// Whether this line keeps an order-level pending flag raised.
    pub fn is_outstanding(&self) -> bool {
        !self.is_composition_parent
            && matches!(
                self.fulfillment_status,
                FulfillmentStatus::Pending | FulfillmentStatus::InProgress
            )
    }
}

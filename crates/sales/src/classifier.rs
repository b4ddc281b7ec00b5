//! Initial fulfillment classification and pending-flag computation.

use fulcrum_catalog::ItemKind;

use crate::order::{DeliveryStatus, FulfillmentStatus, OrderLine, SeparationStatus};

/// Initial per-line state, evaluated once at order creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialClassification {
    pub separation_status: SeparationStatus,
    pub delivery_status: DeliveryStatus,
    pub fulfillment_status: FulfillmentStatus,
}

/// Classify a line from its item's kind and flags.
///
/// Composition parents resolve later by child aggregation. Products with
/// neither separation nor delivery, and services without scheduling, complete
/// immediately.
pub fn classify_line(
    kind: ItemKind,
    requires_separation: bool,
    requires_delivery: bool,
    requires_scheduling: bool,
    is_composition_parent: bool,
) -> InitialClassification {
    if is_composition_parent {
        return InitialClassification {
            separation_status: SeparationStatus::NotRequired,
            delivery_status: DeliveryStatus::NotRequired,
            fulfillment_status: FulfillmentStatus::Pending,
        };
    }

    match kind {
        ItemKind::Product => {
            let separation_status = if requires_separation {
                SeparationStatus::Pending
            } else {
                SeparationStatus::NotRequired
            };
            let delivery_status = if requires_delivery {
                DeliveryStatus::Pending
            } else {
                DeliveryStatus::NotRequired
            };
            let fulfillment_status = if requires_separation || requires_delivery {
                FulfillmentStatus::Pending
            } else {
                FulfillmentStatus::Completed
            };
            InitialClassification {
                separation_status,
                delivery_status,
                fulfillment_status,
            }
        }
        ItemKind::Service => InitialClassification {
            separation_status: SeparationStatus::NotRequired,
            delivery_status: DeliveryStatus::NotRequired,
            fulfillment_status: if requires_scheduling {
                FulfillmentStatus::Pending
            } else {
                FulfillmentStatus::Completed
            },
        },
    }
}

/// Recompute the order-level pending flags by scanning all non-parent lines.
///
/// Returns `(pending_products, pending_services)`.
pub fn pending_flags(lines: &[OrderLine]) -> (bool, bool) {
    let pending_products = lines
        .iter()
        .any(|l| l.kind == ItemKind::Product && l.is_outstanding());
    let pending_services = lines
        .iter()
        .any(|l| l.kind == ItemKind::Service && l.is_outstanding());
    (pending_products, pending_services)
}

//! `fulcrum-sales` — order building, fulfillment, and cancellation.
//!
//! A checkout request becomes an in-memory draft graph first (synthetic line
//! keys, parent/child tree), is committed to the store in topological order,
//! and only then produces stock movements and best-effort financial side
//! effects. Fulfillment transitions converge per-line state, composition
//! parents, and the order-level pending flags.

pub mod builder;
pub mod cancel;
pub mod classifier;
pub mod engine;
pub mod fulfillment;
pub mod order;

pub use builder::{CreateOrderRequest, DiscountSpec, DraftLine, DraftOrder, OrderItemRequest, build_draft};
pub use cancel::{CancellationEngine, CancellationOutcome};
pub use classifier::{InitialClassification, classify_line, pending_flags};
pub use engine::{SaleOutcome, SalesEngine};
pub use fulfillment::FulfillmentService;
pub use order::{
    DeliveryStatus, FulfillmentStatus, Order, OrderLine, OrderStatus, SeparationStatus,
};

//! `fulcrum-purchasing` — purchase receiving.
//!
//! Receiving a purchase is the only path that raises an item's average cost:
//! each received line produces a `purchase` movement and a cost history
//! entry, then the whole receipt hands an accounts-payable total to the
//! financial side best-effort.

pub mod receive;

pub use receive::{PurchasingEngine, ReceiptLine, ReceiptOutcome};

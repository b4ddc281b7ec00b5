//! Decimal rounding conventions.
//!
//! Monetary amounts (prices, stock values) round to 2 decimal places; unit
//! average costs round to 4 so repeated blending does not erode precision.
//! Both round midpoint-away-from-zero, matching conventional bookkeeping.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to 2 decimal places.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a unit average cost to 4 decimal places.
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

//! Pure weighted-average arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fulcrum_core::{round_cost, round_money};

/// Result of blending an incoming lot into the current position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostApplication {
    /// New weighted average unit cost, rounded to 4 decimals.
    pub new_average_cost: Decimal,
    /// Quantity basis after the incoming lot (negative stock counts as zero).
    pub new_quantity: Decimal,
    /// Stock value before the lot, rounded to 2 decimals.
    pub value_before: Decimal,
    /// Stock value after the lot, rounded to 2 decimals.
    pub value_after: Decimal,
}

/// Blend an incoming lot of `quantity` units at `unit_cost` into a position
/// of `prev_quantity` units carried at `prev_average_cost`.
///
/// Negative on-hand quantity contributes no value: the blend starts from a
/// zero basis so a backorder cannot poison the average. An incoming lot that
/// still leaves the position at zero or below takes the lot's own unit cost
/// as the new average.
pub fn apply_incoming(
    prev_quantity: Decimal,
    prev_average_cost: Decimal,
    quantity: Decimal,
    unit_cost: Decimal,
) -> CostApplication {
    let basis = prev_quantity.max(Decimal::ZERO);
    let value_before = basis * prev_average_cost;
    let incoming_value = quantity * unit_cost;
    let new_quantity = basis + quantity;
    let value_after = value_before + incoming_value;

    let new_average_cost = if new_quantity > Decimal::ZERO {
        round_cost(value_after / new_quantity)
    } else {
        round_cost(unit_cost)
    };

    CostApplication {
        new_average_cost,
        new_quantity,
        value_before: round_money(value_before),
        value_after: round_money(value_after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn blends_incoming_lot_into_existing_position() {
        // 3 @ 8.0000 + 10 @ 12.00 => 13 @ 144/13 = 11.0769
        let applied = apply_incoming(dec!(3), dec!(8.0000), dec!(10), dec!(12.00));
        assert_eq!(applied.new_quantity, dec!(13));
        assert_eq!(applied.value_before, dec!(24.00));
        assert_eq!(applied.value_after, dec!(144.00));
        assert_eq!(applied.new_average_cost, dec!(11.0769));
    }

    #[test]
    fn negative_stock_contributes_no_value() {
        let applied = apply_incoming(dec!(-4), dec!(8), dec!(10), dec!(5));
        assert_eq!(applied.new_quantity, dec!(10));
        assert_eq!(applied.value_before, dec!(0.00));
        assert_eq!(applied.new_average_cost, dec!(5.0000));
    }

    #[test]
    fn empty_position_takes_the_lot_cost() {
        let applied = apply_incoming(dec!(0), dec!(0), dec!(7), dec!(3.5));
        assert_eq!(applied.new_average_cost, dec!(3.5000));
        assert_eq!(applied.new_quantity, dec!(7));
    }

    #[test]
    fn zero_resulting_quantity_falls_back_to_unit_cost() {
        let applied = apply_incoming(dec!(0), dec!(9), dec!(0), dec!(4));
        assert_eq!(applied.new_average_cost, dec!(4.0000));
    }

    proptest! {
        // For any run of incoming lots, the running average equals total
        // value over total quantity, to 4 decimals.
        #[test]
        fn average_equals_value_over_quantity(
            lots in prop::collection::vec((1u32..1_000, 1u32..100_000), 1..12)
        ) {
            let mut qty = Decimal::ZERO;
            let mut avg = Decimal::ZERO;
            let mut total_value = Decimal::ZERO;

            for (q, cents) in lots {
                let q = Decimal::from(q);
                let unit_cost = Decimal::new(cents as i64, 2);
                let applied = apply_incoming(qty, avg, q, unit_cost);
                total_value += q * unit_cost;
                qty = applied.new_quantity;
                avg = applied.new_average_cost;
            }

            let expected = fulcrum_core::round_cost(total_value / qty);
            // Each step rounds its average to 4 dp, so the running figure may
            // drift from the exact quotient by at most a rounding ulp per lot.
            let drift = (avg - expected).abs();
            prop_assert!(drift <= Decimal::new(12, 4), "drift {drift} too large");
        }
    }
}

//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Whole units affordable at `price` with `dollars` to spend.
///
/// The quotient is floored; the residual stays behind as cash.
pub fn floor_qty(dollars: Decimal, price: Decimal) -> i64 {
    if price == Decimal::ZERO {
        return 0;
    }
    (dollars / price).floor().to_i64().unwrap_or(0)
}

/// Fractional change from `previous` to `current`.
///
/// Returns `None` when `previous` is zero and the change is undefined.
pub fn pct_change(previous: Decimal, current: Decimal) -> Option<Decimal> {
    if previous == Decimal::ZERO {
        None
    } else {
        Some((current - previous) / previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_floor_qty_rounds_down() {
        assert_eq!(floor_qty(dec!(1000), dec!(250)), 4);
        assert_eq!(floor_qty(dec!(999.99), dec!(250)), 3);
        assert_eq!(floor_qty(dec!(50000), dec!(315.75)), 158);
    }

    #[test]
    fn test_floor_qty_zero_price() {
        assert_eq!(floor_qty(dec!(1000), Decimal::ZERO), 0);
    }

    #[test]
    fn test_floor_qty_negative_dollars() {
        // floor(-3.5) = -4, callers reject non-positive quantities
        assert_eq!(floor_qty(dec!(-875), dec!(250)), -4);
    }

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(dec!(100), dec!(110)), Some(dec!(0.1)));
        assert_eq!(pct_change(dec!(100), dec!(90)), Some(dec!(-0.1)));
        assert_eq!(pct_change(Decimal::ZERO, dec!(50)), None);
    }
}

//! Common helpers shared by the tax calculators.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to cents using half-up rounding.
///
/// Values at exactly 0.005 are rounded away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vest_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the larger of two decimal values.
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// `numerator / denominator`, or zero when the denominator is zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vest_core::calculations::common::ratio_or_zero;
///
/// assert_eq!(ratio_or_zero(dec!(25), dec!(100)), dec!(0.25));
/// assert_eq!(ratio_or_zero(dec!(25), dec!(0)), dec!(0));
/// ```
pub fn ratio_or_zero(
    numerator: Decimal,
    denominator: Decimal,
) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

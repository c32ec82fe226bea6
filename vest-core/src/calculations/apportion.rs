//! Largest-remainder (Hamilton) apportionment of a quantity across weighted slots.

use rust_decimal::Decimal;

/// Splits `target` across `weights` so that the parts sum to `target` exactly.
///
/// Each slot's exact share `target × wᵢ / Σw` is floored; the leftover whole
/// units go one at a time to the slots with the largest fractional
/// remainders, earlier slots first on ties. When `target` itself carries a
/// fraction, the fractional leftover goes to the next slot in remainder
/// order.
///
/// An empty weight list yields no parts. If every weight is zero the whole
/// target goes to the first slot.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vest_core::calculations::apportion;
///
/// let parts = apportion(dec!(10), &[1, 1, 1]);
/// assert_eq!(parts, vec![dec!(4), dec!(3), dec!(3)]);
/// ```
pub fn apportion(
    target: Decimal,
    weights: &[u32],
) -> Vec<Decimal> {
    if weights.is_empty() {
        return Vec::new();
    }

    let total_weight: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    if total_weight == 0 {
        let mut parts = vec![Decimal::ZERO; weights.len()];
        parts[0] = target;
        return parts;
    }
    let total_weight = Decimal::from(total_weight);

    let mut parts = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for &weight in weights {
        let exact = target * Decimal::from(weight) / total_weight;
        let floor = exact.floor();
        parts.push(floor);
        remainders.push(exact - floor);
    }

    let leftover = target - parts.iter().copied().sum::<Decimal>();
    let whole = leftover.floor();
    let fraction = leftover - whole;

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));

    let mut units = whole;
    let mut cursor = order.iter().cycle();
    while units > Decimal::ZERO {
        if let Some(&index) = cursor.next() {
            parts[index] += Decimal::ONE;
        }
        units -= Decimal::ONE;
    }
    if !fraction.is_zero() {
        if let Some(&index) = cursor.next() {
            parts[index] += fraction;
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn sum(parts: &[Decimal]) -> Decimal {
        parts.iter().copied().sum()
    }

    #[test]
    fn apportion_even_split_has_no_leftover() {
        let result = apportion(dec!(1200), &[2, 1, 1, 1, 1, 1, 1, 1, 1]);

        assert_eq!(result[0], dec!(240));
        assert!(result[1..].iter().all(|&p| p == dec!(120)));
        assert_eq!(sum(&result), dec!(1200));
    }

    #[test]
    fn apportion_gives_leftover_to_largest_remainder() {
        let mut weights = vec![6];
        weights.extend(std::iter::repeat_n(1, 42));

        let result = apportion(dec!(100), &weights);

        // 12.5 for the cliff, 2.083 for each month: 4 units left over.
        assert_eq!(result[0], dec!(13));
        assert_eq!(&result[1..4], &[dec!(3), dec!(3), dec!(3)]);
        assert!(result[4..].iter().all(|&p| p == dec!(2)));
        assert_eq!(sum(&result), dec!(100));
    }

    #[test]
    fn apportion_ties_resolve_to_earlier_slot() {
        let result = apportion(dec!(5), &[1, 1, 1]);

        assert_eq!(result, vec![dec!(2), dec!(2), dec!(1)]);
    }

    #[test]
    fn apportion_fractional_target_sums_exactly() {
        let result = apportion(dec!(10.5), &[1, 1, 1, 1]);

        assert_eq!(sum(&result), dec!(10.5));
        assert_eq!(result, vec![dec!(3), dec!(3), dec!(2.5), dec!(2)]);
    }

    #[test]
    fn apportion_quantity_smaller_than_slots() {
        let result = apportion(dec!(2), &[1, 1, 1, 1, 1]);

        assert_eq!(result, vec![dec!(1), dec!(1), dec!(0), dec!(0), dec!(0)]);
    }

    #[test]
    fn apportion_zero_target_is_all_zero() {
        let result = apportion(dec!(0), &[3, 1]);

        assert_eq!(result, vec![dec!(0), dec!(0)]);
    }

    #[test]
    fn apportion_empty_weights_is_empty() {
        assert_eq!(apportion(dec!(10), &[]), Vec::<Decimal>::new());
    }

    #[test]
    fn apportion_zero_weights_puts_target_first() {
        let result = apportion(dec!(7), &[0, 0]);

        assert_eq!(result, vec![dec!(7), dec!(0)]);
    }

    #[test]
    fn apportion_sums_exactly_for_many_quantities() {
        for quantity in [1, 7, 99, 101, 333, 1001, 4799] {
            let target = Decimal::from(quantity);
            for weights in [vec![1; 10], vec![3, 1, 1, 1, 1, 1, 1, 1], vec![6; 8]] {
                assert_eq!(sum(&apportion(target, &weights)), target);
            }
        }
    }
}

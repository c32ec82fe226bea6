//! State levies charged outside the bracket tables.
//!
//! | Levy      | Base |
//! |-----------|------|
//! | Surcharge | Income above the state's surcharge threshold |
//! | SDI       | The slice of the event that keeps year-to-date wages at or below the SDI wage limit |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{max, round_half_up};
use crate::models::StateLevyConfig;

/// SDI withheld on one wage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdiResult {
    /// Portion of the event subject to SDI.
    pub taxable_wages: Decimal,
    pub sdi: Decimal,
}

impl SdiResult {
    pub fn zero() -> Self {
        Self {
            taxable_wages: Decimal::ZERO,
            sdi: Decimal::ZERO,
        }
    }
}

/// Computes SDI on `wages` given the wages already paid this year.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use vest_core::calculations::compute_sdi;
/// use vest_core::{Jurisdiction, StateLevyConfig};
///
/// let levy = StateLevyConfig {
///     jurisdiction: Jurisdiction::state("CA"),
///     tax_year: 2026,
///     surcharge_threshold: dec!(1000000),
///     surcharge_rate: dec!(0.01),
///     sdi_rate: dec!(0.009),
///     sdi_wage_limit: Some(dec!(153164)),
/// };
///
/// // Only 3,164 of the event fits under the wage limit.
/// let result = compute_sdi(&levy, dec!(10000), dec!(150000));
/// assert_eq!(result.sdi, dec!(28.48));
/// ```
pub fn compute_sdi(
    levy: &StateLevyConfig,
    wages: Decimal,
    ytd_wages: Decimal,
) -> SdiResult {
    if wages <= Decimal::ZERO {
        return SdiResult::zero();
    }
    let taxable_wages = match levy.sdi_wage_limit {
        Some(limit) => wages.min(max(limit - ytd_wages, Decimal::ZERO)),
        None => wages,
    };
    SdiResult {
        taxable_wages,
        sdi: round_half_up(taxable_wages * levy.sdi_rate),
    }
}

/// Surcharge owed on `income`; zero at or below the threshold.
pub fn surcharge_tax(
    levy: &StateLevyConfig,
    income: Decimal,
) -> Decimal {
    round_half_up(max(income - levy.surcharge_threshold, Decimal::ZERO) * levy.surcharge_rate)
}

/// Surcharge added to the state marginal rate at `income`.
pub fn surcharge_rate_at(
    levy: &StateLevyConfig,
    income: Decimal,
) -> Decimal {
    if income > levy.surcharge_threshold {
        levy.surcharge_rate
    } else {
        Decimal::ZERO
    }
}

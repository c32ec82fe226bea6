//! Alternative Minimum Tax.
//!
//! | Step | Line |
//! |------|------|
//! | 1 | AMTI = regular taxable income + ISO bargain element + other adjustments |
//! | 2 | Exemption, reduced by the phaseout rate per dollar of AMTI above the phaseout threshold, floored at 0 |
//! | 3 | AMT base = max(0, AMTI − exemption) |
//! | 4 | Tentative AMT = lower rate up to the rate break, upper rate above it |
//! | 5 | AMT owed = max(0, tentative AMT − regular tax) |
//! | 6 | Credit generated = AMT owed |
//!
//! All AMT owed counts toward the credit. Real returns only credit deferral
//! items such as ISO exercises, not exclusion items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::{max, ratio_or_zero, round_half_up};
use crate::models::{ByFilingStatus, FilingStatusCode, TaxYearConfig, TaxYearConfigSet};

/// AMT owed below which an exercise is [`AmtSeverity::Minimal`].
const MINIMAL_AMT_LIMIT: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

/// AMT owed below which an exercise is [`AmtSeverity::Moderate`].
const MODERATE_AMT_LIMIT: Decimal = Decimal::from_parts(25000, 0, 0, false, 0);

/// Errors that can occur when validating an [`AmtConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmtError {
    #[error("AMT rate must be between 0 and 1, got {0}")]
    InvalidRate(Decimal),

    #[error("AMT lower rate {lower} exceeds upper rate {upper}")]
    RatesInverted { lower: Decimal, upper: Decimal },

    #[error("AMT rate break must be positive, got {0}")]
    InvalidRateBreak(Decimal),

    #[error("AMT phaseout rate must be between 0 and 1, got {0}")]
    InvalidPhaseoutRate(Decimal),

    #[error("AMT exemption and phaseout threshold must be non-negative, got {0}")]
    NegativeAmount(Decimal),
}

/// AMT parameters for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmtConfig {
    pub tax_year: i32,
    pub lower_rate: Decimal,
    pub upper_rate: Decimal,
    pub rate_break: Decimal,
    pub phaseout_rate: Decimal,
    pub exemptions: ByFilingStatus<Decimal>,
    pub phaseout_thresholds: ByFilingStatus<Decimal>,
}

impl AmtConfig {
    pub fn from_tax_year_config(config: &TaxYearConfig) -> Self {
        Self {
            tax_year: config.tax_year,
            lower_rate: config.amt_lower_rate,
            upper_rate: config.amt_upper_rate,
            rate_break: config.amt_rate_break,
            phaseout_rate: config.amt_phaseout_rate,
            exemptions: config.thresholds.map(|t| t.amt_exemption),
            phaseout_thresholds: config.thresholds.map(|t| t.amt_phaseout_threshold),
        }
    }

    /// # Errors
    ///
    /// Returns [`AmtError`] if a rate is outside `[0, 1]`, the rates are
    /// inverted, the rate break is not positive, or an exemption or
    /// threshold is negative.
    pub fn validate(&self) -> Result<(), AmtError> {
        for rate in [self.lower_rate, self.upper_rate] {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(AmtError::InvalidRate(rate));
            }
        }
        if self.lower_rate > self.upper_rate {
            return Err(AmtError::RatesInverted {
                lower: self.lower_rate,
                upper: self.upper_rate,
            });
        }
        if self.rate_break <= Decimal::ZERO {
            return Err(AmtError::InvalidRateBreak(self.rate_break));
        }
        if self.phaseout_rate < Decimal::ZERO || self.phaseout_rate > Decimal::ONE {
            return Err(AmtError::InvalidPhaseoutRate(self.phaseout_rate));
        }
        for status in FilingStatusCode::all() {
            for amount in [
                *self.exemptions.get(status),
                *self.phaseout_thresholds.get(status),
            ] {
                if amount < Decimal::ZERO {
                    return Err(AmtError::NegativeAmount(amount));
                }
            }
        }
        Ok(())
    }
}

/// Every line of an AMT computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmtResult {
    pub amti: Decimal,
    pub iso_adjustment: Decimal,
    pub other_adjustments: Decimal,
    pub exemption_before_phaseout: Decimal,
    pub phaseout_amount: Decimal,
    pub exemption_allowed: Decimal,
    pub amt_base: Decimal,
    pub tentative_amt: Decimal,
    pub regular_tax: Decimal,
    pub amt_owed: Decimal,
    /// Regular tax plus AMT owed.
    pub total_tax: Decimal,
    /// Credit carried forward to later years.
    pub credit_generated: Decimal,
    /// Total tax over regular taxable income; zero when that income is zero.
    pub effective_rate_with_amt: Decimal,
    /// Year of the constants used; `None` when none were available.
    pub config_year: Option<i32>,
    pub data_missing: bool,
}

#[derive(Debug, Clone)]
pub struct AmtCalculator {
    config: AmtConfig,
}

impl AmtCalculator {
    pub fn new(config: AmtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AmtConfig {
        &self.config
    }

    /// Computes AMT for one filer.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use vest_core::calculations::{AmtCalculator, AmtConfig};
    /// use vest_core::{ByFilingStatus, FilingStatusCode};
    ///
    /// let config = AmtConfig {
    ///     tax_year: 2026,
    ///     lower_rate: dec!(0.26),
    ///     upper_rate: dec!(0.28),
    ///     rate_break: dec!(232600),
    ///     phaseout_rate: dec!(0.25),
    ///     exemptions: ByFilingStatus {
    ///         single: dec!(88100),
    ///         married_filing_jointly: dec!(137000),
    ///         married_filing_separately: dec!(68500),
    ///         head_of_household: dec!(88100),
    ///         qualifying_surviving_spouse: dec!(137000),
    ///     },
    ///     phaseout_thresholds: ByFilingStatus {
    ///         single: dec!(609350),
    ///         married_filing_jointly: dec!(1218700),
    ///         married_filing_separately: dec!(609350),
    ///         head_of_household: dec!(609350),
    ///         qualifying_surviving_spouse: dec!(1218700),
    ///     },
    /// };
    ///
    /// let result = AmtCalculator::new(config).compute(
    ///     dec!(200000),
    ///     dec!(100000),
    ///     dec!(0),
    ///     FilingStatusCode::Single,
    ///     dec!(37000),
    /// );
    ///
    /// assert_eq!(result.tentative_amt, dec!(55094.00));
    /// assert_eq!(result.amt_owed, dec!(18094.00));
    /// ```
    pub fn compute(
        &self,
        regular_taxable_income: Decimal,
        iso_bargain_element: Decimal,
        other_adjustments: Decimal,
        filing_status: FilingStatusCode,
        regular_tax: Decimal,
    ) -> AmtResult {
        let amti = round_half_up(regular_taxable_income + iso_bargain_element + other_adjustments);
        let exemption_before_phaseout = *self.config.exemptions.get(filing_status);
        let exemption_allowed = self.exemption(amti, filing_status);
        let amt_base = max(amti - exemption_allowed, Decimal::ZERO);
        let tentative_amt = self.tentative_amt(amt_base);
        let amt_owed = max(tentative_amt - regular_tax, Decimal::ZERO);
        let total_tax = regular_tax + amt_owed;

        AmtResult {
            amti,
            iso_adjustment: iso_bargain_element,
            other_adjustments,
            exemption_before_phaseout,
            phaseout_amount: exemption_before_phaseout - exemption_allowed,
            exemption_allowed,
            amt_base,
            tentative_amt,
            regular_tax,
            amt_owed,
            total_tax,
            credit_generated: amt_owed,
            effective_rate_with_amt: if regular_taxable_income > Decimal::ZERO {
                ratio_or_zero(total_tax, regular_taxable_income)
            } else {
                Decimal::ZERO
            },
            config_year: Some(self.config.tax_year),
            data_missing: false,
        }
    }

    /// Exemption after the phaseout.
    fn exemption(
        &self,
        amti: Decimal,
        filing_status: FilingStatusCode,
    ) -> Decimal {
        let exemption = *self.config.exemptions.get(filing_status);
        let threshold = *self.config.phaseout_thresholds.get(filing_status);
        if amti <= threshold {
            return exemption;
        }
        let phaseout = round_half_up((amti - threshold) * self.config.phaseout_rate);
        max(exemption - phaseout, Decimal::ZERO)
    }

    /// Two-tier tentative minimum tax on `amt_base`.
    fn tentative_amt(
        &self,
        amt_base: Decimal,
    ) -> Decimal {
        if amt_base <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let lower = amt_base.min(self.config.rate_break);
        let upper = max(amt_base - self.config.rate_break, Decimal::ZERO);
        round_half_up(lower * self.config.lower_rate + upper * self.config.upper_rate)
    }
}

/// Computes AMT with the constants for `tax_year`, or the nearest year on record.
///
/// With no constants at all, every AMT line is zero, total tax equals
/// `regular_tax`, and `data_missing` is set.
pub fn compute_amt(
    regular_taxable_income: Decimal,
    iso_bargain_element: Decimal,
    other_adjustments: Decimal,
    filing_status: FilingStatusCode,
    tax_year: i32,
    regular_tax: Decimal,
    configs: &TaxYearConfigSet,
) -> AmtResult {
    match configs.for_year(tax_year) {
        Some(config) => AmtCalculator::new(AmtConfig::from_tax_year_config(config)).compute(
            regular_taxable_income,
            iso_bargain_element,
            other_adjustments,
            filing_status,
            regular_tax,
        ),
        None => AmtResult {
            amti: round_half_up(regular_taxable_income + iso_bargain_element + other_adjustments),
            iso_adjustment: iso_bargain_element,
            other_adjustments,
            exemption_before_phaseout: Decimal::ZERO,
            phaseout_amount: Decimal::ZERO,
            exemption_allowed: Decimal::ZERO,
            amt_base: Decimal::ZERO,
            tentative_amt: Decimal::ZERO,
            regular_tax,
            amt_owed: Decimal::ZERO,
            total_tax: regular_tax,
            credit_generated: Decimal::ZERO,
            effective_rate_with_amt: Decimal::ZERO,
            config_year: None,
            data_missing: true,
        },
    }
}

/// Credit usable in a future year: `min(available, max(0, regular − tentative))`.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vest_core::calculations::amt_credit_recovery;
///
/// assert_eq!(amt_credit_recovery(dec!(10000), dec!(40000), dec!(35000)), dec!(5000));
/// assert_eq!(amt_credit_recovery(dec!(10000), dec!(30000), dec!(35000)), dec!(0));
/// ```
pub fn amt_credit_recovery(
    credit_available: Decimal,
    future_regular_tax: Decimal,
    future_tentative_amt: Decimal,
) -> Decimal {
    let usable = max(future_regular_tax - future_tentative_amt, Decimal::ZERO);
    max(credit_available, Decimal::ZERO).min(usable)
}

/// How much AMT an ISO exercise triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmtSeverity {
    /// No AMT owed.
    None,
    /// Under $5,000; recoverable through the credit.
    Minimal,
    /// Under $25,000.
    Moderate,
    /// $25,000 or more; spreading the exercise over several years may help.
    Significant,
}

impl AmtSeverity {
    pub fn classify(amt_owed: Decimal) -> Self {
        if amt_owed <= Decimal::ZERO {
            Self::None
        } else if amt_owed < MINIMAL_AMT_LIMIT {
            Self::Minimal
        } else if amt_owed < MODERATE_AMT_LIMIT {
            Self::Moderate
        } else {
            Self::Significant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::Significant => "significant",
        }
    }
}

/// AMT impact of exercising incentive options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoExerciseProjection {
    pub shares: Decimal,
    pub strike_price: Decimal,
    pub fmv_at_exercise: Decimal,
    /// FMV minus strike, floored at zero.
    pub bargain_element_per_share: Decimal,
    pub total_bargain_element: Decimal,
    pub amt: AmtResult,
    pub severity: AmtSeverity,
}

impl AmtCalculator {
    /// Projects the AMT owed if `shares` options are exercised this year.
    pub fn project_iso_exercise(
        &self,
        annual_income: Decimal,
        shares: Decimal,
        strike_price: Decimal,
        fmv_at_exercise: Decimal,
        filing_status: FilingStatusCode,
        regular_tax: Decimal,
    ) -> IsoExerciseProjection {
        let bargain_element_per_share = max(fmv_at_exercise - strike_price, Decimal::ZERO);
        let total_bargain_element = round_half_up(shares * bargain_element_per_share);
        let amt = self.compute(
            annual_income,
            total_bargain_element,
            Decimal::ZERO,
            filing_status,
            regular_tax,
        );
        let severity = AmtSeverity::classify(amt.amt_owed);

        IsoExerciseProjection {
            shares,
            strike_price,
            fmv_at_exercise,
            bargain_element_per_share,
            total_bargain_element,
            amt,
            severity,
        }
    }
}

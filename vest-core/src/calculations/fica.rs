//! Payroll (FICA) tax on a single income event.
//!
//! | Component           | Base |
//! |---------------------|------|
//! | Social Security     | The slice of the event that keeps year-to-date wages at or below the wage base |
//! | Medicare            | The full event value, uncapped |
//! | Additional Medicare | The part of `annual_income + event_value` above the filing-status threshold |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::{max, round_half_up};
use crate::models::{ByFilingStatus, FilingStatusCode, TaxYearConfig};

/// Errors that can occur when validating a [`FicaConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FicaError {
    #[error("social security tax rate must be between 0 and 1, got {0}")]
    InvalidSocialSecurityRate(Decimal),

    #[error("medicare tax rate must be between 0 and 1, got {0}")]
    InvalidMedicareRate(Decimal),

    #[error("additional medicare rate must be between 0 and 1, got {0}")]
    InvalidAdditionalMedicareRate(Decimal),

    #[error("social security wage base must be positive, got {0}")]
    InvalidWageBase(Decimal),

    #[error("additional medicare threshold must be non-negative, got {0}")]
    InvalidThreshold(Decimal),
}

/// FICA parameters for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FicaConfig {
    pub ss_wage_base: Decimal,
    pub ss_tax_rate: Decimal,
    pub medicare_tax_rate: Decimal,
    pub additional_medicare_rate: Decimal,
    pub additional_medicare_thresholds: ByFilingStatus<Decimal>,
}

impl FicaConfig {
    pub fn from_tax_year_config(config: &TaxYearConfig) -> Self {
        Self {
            ss_wage_base: config.ss_wage_base,
            ss_tax_rate: config.ss_tax_rate,
            medicare_tax_rate: config.medicare_tax_rate,
            additional_medicare_rate: config.additional_medicare_rate,
            additional_medicare_thresholds: config
                .thresholds
                .map(|t| t.additional_medicare_threshold),
        }
    }

    /// # Errors
    ///
    /// Returns [`FicaError`] if a rate is outside `[0, 1]`, the wage base is
    /// not positive, or a threshold is negative.
    pub fn validate(&self) -> Result<(), FicaError> {
        let in_unit = |r: Decimal| r >= Decimal::ZERO && r <= Decimal::ONE;
        if !in_unit(self.ss_tax_rate) {
            return Err(FicaError::InvalidSocialSecurityRate(self.ss_tax_rate));
        }
        if !in_unit(self.medicare_tax_rate) {
            return Err(FicaError::InvalidMedicareRate(self.medicare_tax_rate));
        }
        if !in_unit(self.additional_medicare_rate) {
            return Err(FicaError::InvalidAdditionalMedicareRate(
                self.additional_medicare_rate,
            ));
        }
        if self.ss_wage_base <= Decimal::ZERO {
            return Err(FicaError::InvalidWageBase(self.ss_wage_base));
        }
        for status in FilingStatusCode::all() {
            let threshold = *self.additional_medicare_thresholds.get(status);
            if threshold < Decimal::ZERO {
                return Err(FicaError::InvalidThreshold(threshold));
            }
        }
        Ok(())
    }
}

/// FICA owed on one income event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FicaResult {
    /// Portion of the event subject to Social Security.
    pub ss_taxable: Decimal,
    pub social_security: Decimal,
    pub medicare: Decimal,
    /// Portion of the event subject to Additional Medicare.
    pub additional_medicare_taxable: Decimal,
    pub additional_medicare: Decimal,
    pub total: Decimal,
}

impl FicaResult {
    pub fn zero() -> Self {
        Self {
            ss_taxable: Decimal::ZERO,
            social_security: Decimal::ZERO,
            medicare: Decimal::ZERO,
            additional_medicare_taxable: Decimal::ZERO,
            additional_medicare: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FicaCalculator {
    config: FicaConfig,
}

impl FicaCalculator {
    pub fn new(config: FicaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FicaConfig {
        &self.config
    }

    /// Computes FICA on `event_value`.
    ///
    /// `annual_income` excludes the event itself; `ytd_wages` are the wages
    /// already counted toward the Social Security wage base.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use vest_core::calculations::{FicaCalculator, FicaConfig};
    /// use vest_core::{ByFilingStatus, FilingStatusCode};
    ///
    /// let config = FicaConfig {
    ///     ss_wage_base: dec!(176100),
    ///     ss_tax_rate: dec!(0.062),
    ///     medicare_tax_rate: dec!(0.0145),
    ///     additional_medicare_rate: dec!(0.009),
    ///     additional_medicare_thresholds: ByFilingStatus {
    ///         single: dec!(200000),
    ///         married_filing_jointly: dec!(250000),
    ///         married_filing_separately: dec!(125000),
    ///         head_of_household: dec!(200000),
    ///         qualifying_surviving_spouse: dec!(250000),
    ///     },
    /// };
    ///
    /// let result = FicaCalculator::new(config).compute(
    ///     dec!(10000),
    ///     dec!(100000),
    ///     FilingStatusCode::Single,
    ///     dec!(170000),
    /// );
    ///
    /// // Only 6,100 of the event fits under the wage base.
    /// assert_eq!(result.social_security, dec!(378.20));
    /// assert_eq!(result.medicare, dec!(145.00));
    /// ```
    pub fn compute(
        &self,
        event_value: Decimal,
        annual_income: Decimal,
        filing_status: FilingStatusCode,
        ytd_wages: Decimal,
    ) -> FicaResult {
        if event_value <= Decimal::ZERO {
            return FicaResult::zero();
        }

        let ss_taxable = self.ss_taxable(event_value, ytd_wages);
        let social_security = round_half_up(ss_taxable * self.config.ss_tax_rate);
        let medicare = round_half_up(event_value * self.config.medicare_tax_rate);
        let additional_medicare_taxable =
            self.additional_medicare_taxable(event_value, annual_income, filing_status);
        let additional_medicare =
            round_half_up(additional_medicare_taxable * self.config.additional_medicare_rate);

        FicaResult {
            ss_taxable,
            social_security,
            medicare,
            additional_medicare_taxable,
            additional_medicare,
            total: social_security + medicare + additional_medicare,
        }
    }

    fn ss_taxable(
        &self,
        event_value: Decimal,
        ytd_wages: Decimal,
    ) -> Decimal {
        let remaining_base = max(self.config.ss_wage_base - ytd_wages, Decimal::ZERO);
        event_value.min(remaining_base)
    }

    fn additional_medicare_taxable(
        &self,
        event_value: Decimal,
        annual_income: Decimal,
        filing_status: FilingStatusCode,
    ) -> Decimal {
        let threshold = *self.config.additional_medicare_thresholds.get(filing_status);
        if annual_income >= threshold {
            event_value
        } else {
            max(annual_income + event_value - threshold, Decimal::ZERO)
        }
    }
}

/// Computes FICA for one event under `config`.
pub fn compute_fica(
    event_value: Decimal,
    annual_income: Decimal,
    filing_status: FilingStatusCode,
    ytd_wages: Decimal,
    config: &FicaConfig,
) -> FicaResult {
    FicaCalculator::new(config.clone()).compute(event_value, annual_income, filing_status, ytd_wages)
}

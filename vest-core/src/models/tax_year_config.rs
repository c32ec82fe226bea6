use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ByFilingStatus, FilingStatusCode};

/// Errors that can occur when validating year constants and state levies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A rate was outside `[0, 1]`.
    #[error("{field} for {tax_year} must be between 0 and 1, got {value}")]
    InvalidRate {
        tax_year: i32,
        field: &'static str,
        value: Decimal,
    },

    /// An amount that must be positive was zero or negative.
    #[error("{field} for {tax_year} must be positive, got {value}")]
    NonPositiveAmount {
        tax_year: i32,
        field: &'static str,
        value: Decimal,
    },

    /// An amount that must be non-negative was negative.
    #[error("{field} for {tax_year} must be non-negative, got {value}")]
    NegativeAmount {
        tax_year: i32,
        field: &'static str,
        value: Decimal,
    },

    /// State levies were configured for the federal jurisdiction.
    #[error("state levies for {tax_year} must name a state, not federal")]
    FederalStateLevy { tax_year: i32 },

    /// A threshold or exemption was negative.
    #[error("{field} for {tax_year} ({status}) must be non-negative, got {value}")]
    NegativeThreshold {
        tax_year: i32,
        status: &'static str,
        field: &'static str,
        value: Decimal,
    },

    /// The lower AMT rate exceeded the upper one.
    #[error("AMT lower rate {lower} exceeds upper rate {upper} for {tax_year}")]
    AmtRatesInverted {
        tax_year: i32,
        lower: Decimal,
        upper: Decimal,
    },
}

/// Filing-status-dependent thresholds for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusThresholds {
    pub additional_medicare_threshold: Decimal,
    pub niit_threshold: Decimal,
    pub amt_exemption: Decimal,
    pub amt_phaseout_threshold: Decimal,
}

/// Federal constants for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxYearConfig {
    pub tax_year: i32,
    pub ss_wage_base: Decimal,
    /// Employee share of Social Security (6.2%).
    pub ss_tax_rate: Decimal,
    /// Employee share of Medicare (1.45%).
    pub medicare_tax_rate: Decimal,
    pub additional_medicare_rate: Decimal,
    pub niit_rate: Decimal,
    pub amt_lower_rate: Decimal,
    pub amt_upper_rate: Decimal,
    /// AMT base above which the upper rate applies.
    pub amt_rate_break: Decimal,
    /// Exemption reduction per dollar of AMTI above the phaseout threshold.
    pub amt_phaseout_rate: Decimal,
    pub thresholds: ByFilingStatus<StatusThresholds>,
}

impl TaxYearConfig {
    pub fn thresholds_for(&self, status: FilingStatusCode) -> &StatusThresholds {
        self.thresholds.get(status)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a rate falls outside `[0, 1]`, the wage base
    /// or rate break is not positive, the AMT rates are inverted, or any
    /// per-status threshold is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("ss_tax_rate", self.ss_tax_rate),
            ("medicare_tax_rate", self.medicare_tax_rate),
            ("additional_medicare_rate", self.additional_medicare_rate),
            ("niit_rate", self.niit_rate),
            ("amt_lower_rate", self.amt_lower_rate),
            ("amt_upper_rate", self.amt_upper_rate),
            ("amt_phaseout_rate", self.amt_phaseout_rate),
        ];
        for (field, value) in rates {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::InvalidRate {
                    tax_year: self.tax_year,
                    field,
                    value,
                });
            }
        }

        for (field, value) in [
            ("ss_wage_base", self.ss_wage_base),
            ("amt_rate_break", self.amt_rate_break),
        ] {
            if value <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveAmount {
                    tax_year: self.tax_year,
                    field,
                    value,
                });
            }
        }

        if self.amt_lower_rate > self.amt_upper_rate {
            return Err(ConfigError::AmtRatesInverted {
                tax_year: self.tax_year,
                lower: self.amt_lower_rate,
                upper: self.amt_upper_rate,
            });
        }

        for status in FilingStatusCode::all() {
            let t = self.thresholds.get(status);
            for (field, value) in [
                ("additional_medicare_threshold", t.additional_medicare_threshold),
                ("niit_threshold", t.niit_threshold),
                ("amt_exemption", t.amt_exemption),
                ("amt_phaseout_threshold", t.amt_phaseout_threshold),
            ] {
                if value < Decimal::ZERO {
                    return Err(ConfigError::NegativeThreshold {
                        tax_year: self.tax_year,
                        status: status.as_str(),
                        field,
                        value,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Year constants keyed by tax year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxYearConfigSet {
    configs: BTreeMap<i32, TaxYearConfig>,
}

impl TaxYearConfigSet {
    pub fn new(configs: impl IntoIterator<Item = TaxYearConfig>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.tax_year, c)).collect(),
        }
    }

    pub fn insert(
        &mut self,
        config: TaxYearConfig,
    ) {
        self.configs.insert(config.tax_year, config);
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.configs.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Config for `tax_year`, or the nearest year on record.
    ///
    /// Equal distance resolves to the later year. Returns `None` only when
    /// the set is empty.
    pub fn for_year(
        &self,
        tax_year: i32,
    ) -> Option<&TaxYearConfig> {
        self.configs
            .values()
            .min_by_key(|c| ((c.tax_year - tax_year).abs(), -c.tax_year))
    }
}

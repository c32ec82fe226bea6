use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{ConfigError, Jurisdiction};

/// State taxes that sit outside the bracket tables, for one state and year.
///
/// The surcharge is a flat rate on income above a threshold, added to both
/// the state tax and the state marginal rate. SDI is disability insurance
/// withheld from wages up to an optional wage limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLevyConfig {
    pub jurisdiction: Jurisdiction,
    pub tax_year: i32,
    pub surcharge_threshold: Decimal,
    pub surcharge_rate: Decimal,
    pub sdi_rate: Decimal,
    /// `None` when every wage dollar is subject to SDI.
    pub sdi_wage_limit: Option<Decimal>,
}

impl StateLevyConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the jurisdiction is federal, a rate falls
    /// outside `[0, 1]`, the surcharge threshold is negative, or the SDI
    /// wage limit is not positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jurisdiction == Jurisdiction::Federal {
            return Err(ConfigError::FederalStateLevy {
                tax_year: self.tax_year,
            });
        }

        for (field, value) in [
            ("surcharge_rate", self.surcharge_rate),
            ("sdi_rate", self.sdi_rate),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::InvalidRate {
                    tax_year: self.tax_year,
                    field,
                    value,
                });
            }
        }

        if self.surcharge_threshold < Decimal::ZERO {
            return Err(ConfigError::NegativeAmount {
                tax_year: self.tax_year,
                field: "surcharge_threshold",
                value: self.surcharge_threshold,
            });
        }

        if let Some(limit) = self.sdi_wage_limit.filter(|l| *l <= Decimal::ZERO) {
            return Err(ConfigError::NonPositiveAmount {
                tax_year: self.tax_year,
                field: "sdi_wage_limit",
                value: limit,
            });
        }

        Ok(())
    }
}

/// State levies keyed by state and tax year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLevySet {
    levies: BTreeMap<(Jurisdiction, i32), StateLevyConfig>,
}

impl StateLevySet {
    pub fn new(levies: impl IntoIterator<Item = StateLevyConfig>) -> Self {
        let mut set = Self::default();
        for levy in levies {
            set.insert(levy);
        }
        set
    }

    pub fn insert(
        &mut self,
        levy: StateLevyConfig,
    ) {
        self.levies
            .insert((levy.jurisdiction.clone(), levy.tax_year), levy);
    }

    pub fn len(&self) -> usize {
        self.levies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateLevyConfig> {
        self.levies.values()
    }

    /// Levies for `jurisdiction` in `tax_year`, or the nearest year on
    /// record for that state. Equal distance resolves to the later year.
    pub fn for_state(
        &self,
        jurisdiction: &Jurisdiction,
        tax_year: i32,
    ) -> Option<&StateLevyConfig> {
        self.levies
            .values()
            .filter(|l| &l.jurisdiction == jurisdiction)
            .min_by_key(|l| ((l.tax_year - tax_year).abs(), -l.tax_year))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_decimal_macros::dec;

    use super::*;

    /// California mental health surcharge and SDI for 2026.
    pub(crate) fn california_2026() -> StateLevyConfig {
        StateLevyConfig {
            jurisdiction: Jurisdiction::state("CA"),
            tax_year: 2026,
            surcharge_threshold: dec!(1000000),
            surcharge_rate: dec!(0.01),
            sdi_rate: dec!(0.009),
            sdi_wage_limit: Some(dec!(153164)),
        }
    }
}

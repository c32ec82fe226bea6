use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use vest_core::{
    ByFilingStatus, ConfigError, FilingStatusCode, Jurisdiction, StateLevyConfig,
    StatusThresholds, TaxYearConfig,
};

use crate::loader::deserialize_optional_decimal;

/// Errors that can occur when loading year constants and state levies.
///
/// Row numbers count the header as row 1.
#[derive(Debug, Error)]
pub enum ConfigLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Tax year {0} appears more than once")]
    DuplicateYear(i32),

    #[error("Row {row}: unknown filing status '{value}'")]
    InvalidFilingStatus { row: usize, value: String },

    #[error("Row {row}: thresholds for {tax_year} have no matching year config")]
    UnknownYear { row: usize, tax_year: i32 },

    #[error("Row {row}: duplicate thresholds for {tax_year} {status}")]
    DuplicateThresholds {
        row: usize,
        tax_year: i32,
        status: &'static str,
    },

    #[error("Tax year {tax_year} has no thresholds for filing status {status}")]
    MissingStatus { tax_year: i32, status: &'static str },

    #[error("Row {row}: '{value}' is not a state")]
    InvalidState { row: usize, value: String },

    #[error("Row {row}: duplicate state levies for {state} {tax_year}")]
    DuplicateStateLevy {
        row: usize,
        state: String,
        tax_year: i32,
    },

    #[error("Invalid year config: {0}")]
    Invalid(#[from] ConfigError),
}

impl From<csv::Error> for ConfigLoaderError {
    fn from(err: csv::Error) -> Self {
        ConfigLoaderError::CsvParse(err.to_string())
    }
}

/// One row of `tax_year_config.csv`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct YearRecord {
    pub tax_year: i32,
    pub ss_wage_base: Decimal,
    pub ss_tax_rate: Decimal,
    pub medicare_tax_rate: Decimal,
    pub additional_medicare_rate: Decimal,
    pub niit_rate: Decimal,
    pub amt_lower_rate: Decimal,
    pub amt_upper_rate: Decimal,
    pub amt_rate_break: Decimal,
    pub amt_phaseout_rate: Decimal,
}

/// One row of `filing_thresholds.csv`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThresholdRecord {
    pub tax_year: i32,
    pub filing_status: String,
    pub additional_medicare_threshold: Decimal,
    pub niit_threshold: Decimal,
    pub amt_exemption: Decimal,
    pub amt_phaseout_threshold: Decimal,
}

impl From<&ThresholdRecord> for StatusThresholds {
    fn from(record: &ThresholdRecord) -> Self {
        Self {
            additional_medicare_threshold: record.additional_medicare_threshold,
            niit_threshold: record.niit_threshold,
            amt_exemption: record.amt_exemption,
            amt_phaseout_threshold: record.amt_phaseout_threshold,
        }
    }
}

/// Loader for per-year constants.
///
/// Year-level values and per-status thresholds live in two files; `build`
/// joins them and requires every filing status for every year.
pub struct TaxYearConfigLoader;

impl TaxYearConfigLoader {
    pub fn parse_years<R: Read>(reader: R) -> Result<Vec<YearRecord>, ConfigLoaderError> {
        parse_records(reader)
    }

    pub fn parse_thresholds<R: Read>(
        reader: R
    ) -> Result<Vec<ThresholdRecord>, ConfigLoaderError> {
        parse_records(reader)
    }

    /// Join year rows with their thresholds and validate each config.
    pub fn build(
        years: &[YearRecord],
        thresholds: &[ThresholdRecord],
    ) -> Result<Vec<TaxYearConfig>, ConfigLoaderError> {
        let mut by_year: BTreeMap<i32, &YearRecord> = BTreeMap::new();
        for year in years {
            if by_year.insert(year.tax_year, year).is_some() {
                return Err(ConfigLoaderError::DuplicateYear(year.tax_year));
            }
        }

        let mut by_status: HashMap<(i32, FilingStatusCode), StatusThresholds> = HashMap::new();
        for (index, record) in thresholds.iter().enumerate() {
            let row = index + 2;
            let status = FilingStatusCode::parse(&record.filing_status).ok_or_else(|| {
                ConfigLoaderError::InvalidFilingStatus {
                    row,
                    value: record.filing_status.clone(),
                }
            })?;
            if !by_year.contains_key(&record.tax_year) {
                return Err(ConfigLoaderError::UnknownYear {
                    row,
                    tax_year: record.tax_year,
                });
            }
            if by_status
                .insert((record.tax_year, status), record.into())
                .is_some()
            {
                return Err(ConfigLoaderError::DuplicateThresholds {
                    row,
                    tax_year: record.tax_year,
                    status: status.as_str(),
                });
            }
        }

        by_year
            .into_values()
            .map(|year| {
                let thresholds = ByFilingStatus::try_from_fn(|status| {
                    by_status
                        .remove(&(year.tax_year, status))
                        .ok_or(ConfigLoaderError::MissingStatus {
                            tax_year: year.tax_year,
                            status: status.as_str(),
                        })
                })?;
                let config = TaxYearConfig {
                    tax_year: year.tax_year,
                    ss_wage_base: year.ss_wage_base,
                    ss_tax_rate: year.ss_tax_rate,
                    medicare_tax_rate: year.medicare_tax_rate,
                    additional_medicare_rate: year.additional_medicare_rate,
                    niit_rate: year.niit_rate,
                    amt_lower_rate: year.amt_lower_rate,
                    amt_upper_rate: year.amt_upper_rate,
                    amt_rate_break: year.amt_rate_break,
                    amt_phaseout_rate: year.amt_phaseout_rate,
                    thresholds,
                };
                config.validate()?;
                Ok(config)
            })
            .collect()
    }
}

/// One row of `state_levies.csv`. A blank wage limit means no limit.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StateLevyRecord {
    pub jurisdiction: String,
    pub tax_year: i32,
    pub surcharge_threshold: Decimal,
    pub surcharge_rate: Decimal,
    pub sdi_rate: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub sdi_wage_limit: Option<Decimal>,
}

/// Loader for state surcharges and SDI, one row per state and year.
pub struct StateLevyLoader;

impl StateLevyLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<StateLevyRecord>, ConfigLoaderError> {
        parse_records(reader)
    }

    pub fn build(records: &[StateLevyRecord]) -> Result<Vec<StateLevyConfig>, ConfigLoaderError> {
        let mut levies: BTreeMap<(Jurisdiction, i32), StateLevyConfig> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            let row = index + 2;
            let jurisdiction = match Jurisdiction::parse(&record.jurisdiction) {
                Some(j @ Jurisdiction::State(_)) => j,
                _ => {
                    return Err(ConfigLoaderError::InvalidState {
                        row,
                        value: record.jurisdiction.clone(),
                    });
                }
            };
            let levy = StateLevyConfig {
                jurisdiction,
                tax_year: record.tax_year,
                surcharge_threshold: record.surcharge_threshold,
                surcharge_rate: record.surcharge_rate,
                sdi_rate: record.sdi_rate,
                sdi_wage_limit: record.sdi_wage_limit,
            };
            levy.validate()?;
            let key = (levy.jurisdiction.clone(), levy.tax_year);
            if levies.insert(key, levy).is_some() {
                return Err(ConfigLoaderError::DuplicateStateLevy {
                    row,
                    state: record.jurisdiction.trim().to_ascii_uppercase(),
                    tax_year: record.tax_year,
                });
            }
        }
        Ok(levies.into_values().collect())
    }
}

fn parse_records<R, T>(reader: R) -> Result<Vec<T>, ConfigLoaderError>
where
    R: Read,
    T: serde::de::DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize() {
        records.push(result?);
    }

    Ok(records)
}

use std::collections::BTreeMap;
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use vest_core::{
    BracketTableError, FilingStatusCode, Jurisdiction, TableKey, TaxBracket, TaxBracketTable,
    TaxType,
};

/// Errors that can occur when loading bracket tables.
///
/// Row numbers count the header as row 1.
#[derive(Debug, Error)]
pub enum BracketLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Row {row}: unknown jurisdiction '{value}'")]
    InvalidJurisdiction { row: usize, value: String },

    #[error("Row {row}: unknown filing status '{value}'")]
    InvalidFilingStatus { row: usize, value: String },

    #[error("Row {row}: unknown tax type '{value}'")]
    InvalidTaxType { row: usize, value: String },

    #[error("Invalid bracket table: {0}")]
    InvalidTable(#[from] BracketTableError),
}

impl From<csv::Error> for BracketLoaderError {
    fn from(err: csv::Error) -> Self {
        BracketLoaderError::CsvParse(err.to_string())
    }
}

/// Expands a filing-status column value. `*` applies the row to every status.
fn filing_status_codes(value: &str) -> Option<Vec<FilingStatusCode>> {
    match value {
        "*" => Some(FilingStatusCode::all().to_vec()),
        code => FilingStatusCode::parse(code).map(|status| vec![status]),
    }
}

/// A single record from the brackets CSV file.
///
/// - `jurisdiction`: `federal` or a two-letter state code
/// - `tax_year`: the tax year (e.g., 2025)
/// - `filing_status`: `S`, `MFJ`, `MFS`, `HOH`, `QSS`, or `*` for all
/// - `tax_type`: `ordinary` or `capital_gains_long`
/// - `min_income`: lower bound of the bracket
/// - `max_income`: upper bound (empty for unlimited)
/// - `rate`: marginal rate as a decimal (e.g., 0.10 for 10%)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub jurisdiction: String,
    pub tax_year: i32,
    pub filing_status: String,
    pub tax_type: String,
    pub min_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_income: Option<Decimal>,
    pub rate: Decimal,
}

pub(crate) fn deserialize_optional_decimal<'de, D>(
    deserializer: D
) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Loader for bracket tables from CSV files.
///
/// Rows are grouped by (jurisdiction, year, status, type) and each group is
/// validated as a [`TaxBracketTable`].
pub struct BracketTableLoader;

impl BracketTableLoader {
    /// Parse bracket records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketRecord>, BracketLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Group records into validated tables, ordered by key.
    pub fn build(records: &[BracketRecord]) -> Result<Vec<TaxBracketTable>, BracketLoaderError> {
        let mut groups: BTreeMap<TableKey, Vec<TaxBracket>> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            let row = index + 2;
            let jurisdiction = Jurisdiction::parse(&record.jurisdiction).ok_or_else(|| {
                BracketLoaderError::InvalidJurisdiction {
                    row,
                    value: record.jurisdiction.clone(),
                }
            })?;
            let tax_type = TaxType::parse(&record.tax_type).ok_or_else(|| {
                BracketLoaderError::InvalidTaxType {
                    row,
                    value: record.tax_type.clone(),
                }
            })?;
            let statuses = filing_status_codes(&record.filing_status).ok_or_else(|| {
                BracketLoaderError::InvalidFilingStatus {
                    row,
                    value: record.filing_status.clone(),
                }
            })?;

            for filing_status in statuses {
                let key = TableKey {
                    jurisdiction: jurisdiction.clone(),
                    tax_year: record.tax_year,
                    filing_status,
                    tax_type,
                };
                groups.entry(key).or_default().push(TaxBracket {
                    min_income: record.min_income,
                    max_income: record.max_income,
                    tax_rate: record.rate,
                });
            }
        }

        groups
            .into_iter()
            .map(|(key, brackets)| TaxBracketTable::new(key, brackets).map_err(Into::into))
            .collect()
    }
}

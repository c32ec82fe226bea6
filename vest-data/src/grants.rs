use std::io::Read;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use vest_core::{BonusType, GrantCategory, GrantTerms, ShareCategory, default_vest_terms};

use crate::loader::deserialize_optional_decimal;

/// Errors that can occur when loading grants.
///
/// Row numbers count the header as row 1.
#[derive(Debug, Error, PartialEq)]
pub enum GrantLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Row {row}: unknown grant category '{value}'")]
    InvalidCategory { row: usize, value: String },

    #[error("Row {row}: unknown share category '{value}'")]
    InvalidShareCategory { row: usize, value: String },

    #[error("Row {row}: unknown bonus type '{value}'")]
    InvalidBonusType { row: usize, value: String },

    #[error("Row {row}: {field} must be non-negative, got {value}")]
    NegativeAmount {
        row: usize,
        field: &'static str,
        value: Decimal,
    },

    #[error("Row {row}: purchase discount must be between 0 and 1, got {value}")]
    InvalidDiscount { row: usize, value: Decimal },
}

impl From<csv::Error> for GrantLoaderError {
    fn from(err: csv::Error) -> Self {
        GrantLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from a grants CSV file.
///
/// `vest_years`, `cliff_years`, `purchase_discount` and `bonus_type` may be
/// left empty or omitted from the header entirely.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GrantRecord {
    pub id: i64,
    pub grant_date: NaiveDate,
    pub grant_category: String,
    pub share_category: String,
    pub quantity: Decimal,
    pub price_at_grant: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub vest_years: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub cliff_years: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub purchase_discount: Option<Decimal>,
    #[serde(default)]
    pub bonus_type: Option<String>,
}

/// Loader for grant terms from CSV files.
pub struct GrantLoader;

impl GrantLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<GrantRecord>, GrantLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: GrantRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Convert records into grant terms.
    ///
    /// Blank vest or cliff years are filled from [`default_vest_terms`]; a
    /// blank discount means 0.
    pub fn build(records: &[GrantRecord]) -> Result<Vec<GrantTerms>, GrantLoaderError> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| build_grant(index + 2, record))
            .collect()
    }
}

fn build_grant(
    row: usize,
    record: &GrantRecord,
) -> Result<GrantTerms, GrantLoaderError> {
    let category = GrantCategory::parse(&record.grant_category).ok_or_else(|| {
        GrantLoaderError::InvalidCategory {
            row,
            value: record.grant_category.clone(),
        }
    })?;
    let share_category = ShareCategory::parse(&record.share_category).ok_or_else(|| {
        GrantLoaderError::InvalidShareCategory {
            row,
            value: record.share_category.clone(),
        }
    })?;
    let bonus_type = match record.bonus_type.as_deref() {
        None | Some("") => None,
        Some(value) => Some(BonusType::parse(value).ok_or_else(|| {
            GrantLoaderError::InvalidBonusType {
                row,
                value: value.to_string(),
            }
        })?),
    };

    let purchase_discount = record.purchase_discount.unwrap_or(Decimal::ZERO);
    if purchase_discount < Decimal::ZERO || purchase_discount > Decimal::ONE {
        return Err(GrantLoaderError::InvalidDiscount {
            row,
            value: purchase_discount,
        });
    }

    let (default_vest, default_cliff) = default_vest_terms(category, share_category, bonus_type);
    let vest_years = record.vest_years.unwrap_or(default_vest);
    let cliff_years = record.cliff_years.unwrap_or(default_cliff);

    for (field, value) in [
        ("quantity", record.quantity),
        ("price_at_grant", record.price_at_grant),
        ("vest_years", vest_years),
        ("cliff_years", cliff_years),
    ] {
        if value < Decimal::ZERO {
            return Err(GrantLoaderError::NegativeAmount { row, field, value });
        }
    }

    if record.vest_years.is_none() || record.cliff_years.is_none() {
        debug!(
            grant_id = record.id,
            vest_years = %vest_years,
            cliff_years = %cliff_years,
            "applied default vest terms"
        );
    }

    Ok(GrantTerms {
        id: record.id,
        grant_date: record.grant_date,
        category,
        share_category,
        quantity: record.quantity,
        price_at_grant: record.price_at_grant,
        vest_years,
        cliff_years,
        purchase_discount,
        bonus_type,
    })
}

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{StateLevyConfig, TableKey, TaxBracketTable, TaxYearConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Record not found")]
    NotFound,

    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid reference data: {0}")]
    InvalidData(String),
}

#[async_trait]
pub trait ReferenceSource: Send + Sync {
    // Year constants
    async fn list_tax_years(&self) -> Result<Vec<i32>, ReferenceError>;
    async fn get_tax_year_config(&self, year: i32) -> Result<TaxYearConfig, ReferenceError>;

    // Bracket tables
    async fn list_table_keys(&self) -> Result<Vec<TableKey>, ReferenceError>;

    async fn get_bracket_table(&self, key: &TableKey) -> Result<TaxBracketTable, ReferenceError>;

    // State levies; sources without any keep the default.
    async fn list_state_levies(&self) -> Result<Vec<StateLevyConfig>, ReferenceError> {
        Ok(Vec::new())
    }
}

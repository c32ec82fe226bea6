use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{FilingStatusCode, Jurisdiction};

/// A user's tax situation, supplied per computation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxProfile {
    pub filing_status: FilingStatusCode,
    /// Two-letter state code, if any.
    pub state: Option<String>,
    /// Expected total annual income, used to pick marginal brackets.
    pub annual_income: Option<Decimal>,
    /// Wages already paid this year, for the Social Security cap.
    #[serde(default)]
    pub ytd_wages: Decimal,
    #[serde(default = "default_include_fica")]
    pub include_fica: bool,
    #[serde(default)]
    pub use_manual_rates: bool,
    pub manual_federal_rate: Option<Decimal>,
    pub manual_state_rate: Option<Decimal>,
    pub manual_ltcg_rate: Option<Decimal>,
}

fn default_include_fica() -> bool {
    true
}

impl TaxProfile {
    pub fn new(filing_status: FilingStatusCode) -> Self {
        Self {
            filing_status,
            state: None,
            annual_income: None,
            ytd_wages: Decimal::ZERO,
            include_fica: true,
            use_manual_rates: false,
            manual_federal_rate: None,
            manual_state_rate: None,
            manual_ltcg_rate: None,
        }
    }

    pub fn state_jurisdiction(&self) -> Option<Jurisdiction> {
        self.state
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(Jurisdiction::state)
    }
}

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::FilingStatusCode;

/// States that levy no tax on wage income.
const NO_INCOME_TAX_STATES: [&str; 9] = ["AK", "FL", "NV", "NH", "SD", "TN", "TX", "WA", "WY"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Jurisdiction {
    Federal,
    /// Upper-case two-letter state code.
    State(String),
}

impl Jurisdiction {
    pub fn state(code: &str) -> Self {
        Self::State(code.trim().to_ascii_uppercase())
    }

    /// Parses `federal` or a two-letter state code (any case).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("federal") {
            return Some(Self::Federal);
        }
        if s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(Self::state(s));
        }
        None
    }

    pub fn as_code(&self) -> &str {
        match self {
            Self::Federal => "federal",
            Self::State(code) => code,
        }
    }

    pub fn has_income_tax(&self) -> bool {
        match self {
            Self::Federal => true,
            Self::State(code) => !NO_INCOME_TAX_STATES.contains(&code.as_str()),
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxType {
    Ordinary,
    LongTermCapitalGains,
}

impl TaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::LongTermCapitalGains => "capital_gains_long",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ordinary" => Some(Self::Ordinary),
            "capital_gains_long" | "ltcg" => Some(Self::LongTermCapitalGains),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min_income: Decimal,
    /// `None` for the top, unbounded bracket.
    pub max_income: Option<Decimal>,
    pub tax_rate: Decimal,
}

impl TaxBracket {
    /// Whether `income` falls inside `[min_income, max_income]`.
    pub fn contains(&self, income: Decimal) -> bool {
        income >= self.min_income && self.max_income.is_none_or(|max| income <= max)
    }
}

/// Identifies one bracket table: who levies it, for which year, for which
/// filing status, and on which kind of income.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    pub jurisdiction: Jurisdiction,
    pub tax_year: i32,
    pub filing_status: FilingStatusCode,
    pub tax_type: TaxType,
}

impl fmt::Display for TableKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.jurisdiction,
            self.tax_year,
            self.filing_status.as_str(),
            self.tax_type.as_str()
        )
    }
}

/// Errors raised when a bracket table fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketTableError {
    #[error("bracket table {0} has no brackets")]
    Empty(TableKey),

    #[error("bracket table {key} starts at {found}, expected 0")]
    FirstBracketNotZero { key: TableKey, found: Decimal },

    #[error("bracket table {key}: bracket {index} starts at {found}, expected {expected}")]
    NotContiguous {
        key: TableKey,
        index: usize,
        expected: Decimal,
        found: Decimal,
    },

    #[error("bracket table {key}: bracket {index} has an empty or inverted range")]
    EmptyRange { key: TableKey, index: usize },

    #[error("bracket table {key}: bracket {index} is unbounded but is not the last bracket")]
    UnboundedBeforeLast { key: TableKey, index: usize },

    #[error("bracket table {0}: top bracket must be unbounded")]
    TopBracketBounded(TableKey),

    #[error("bracket table {key}: bracket {index} has rate {rate} outside [0, 1]")]
    InvalidRate {
        key: TableKey,
        index: usize,
        rate: Decimal,
    },
}

/// A validated, gapless bracket table covering `[0, ∞)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracketTable {
    key: TableKey,
    brackets: Vec<TaxBracket>,
}

impl TaxBracketTable {
    /// Sorts `brackets` by lower bound and validates them.
    ///
    /// # Errors
    ///
    /// Returns [`BracketTableError`] if the brackets are empty, do not start
    /// at zero, leave a gap or overlap, contain an empty range, have an
    /// unbounded bracket anywhere but last, or carry a rate outside `[0, 1]`.
    pub fn new(
        key: TableKey,
        mut brackets: Vec<TaxBracket>,
    ) -> Result<Self, BracketTableError> {
        brackets.sort_by(|a, b| a.min_income.cmp(&b.min_income));

        let first = brackets
            .first()
            .ok_or_else(|| BracketTableError::Empty(key.clone()))?;
        if !first.min_income.is_zero() {
            return Err(BracketTableError::FirstBracketNotZero {
                key,
                found: first.min_income,
            });
        }

        let last_index = brackets.len() - 1;
        for (index, bracket) in brackets.iter().enumerate() {
            if bracket.tax_rate < Decimal::ZERO || bracket.tax_rate > Decimal::ONE {
                return Err(BracketTableError::InvalidRate {
                    key,
                    index,
                    rate: bracket.tax_rate,
                });
            }

            match bracket.max_income {
                None if index != last_index => {
                    return Err(BracketTableError::UnboundedBeforeLast { key, index });
                }
                None => {}
                Some(_) if index == last_index => {
                    return Err(BracketTableError::TopBracketBounded(key));
                }
                Some(max) if max <= bracket.min_income => {
                    return Err(BracketTableError::EmptyRange { key, index });
                }
                Some(max) => {
                    let next = &brackets[index + 1];
                    if next.min_income != max {
                        return Err(BracketTableError::NotContiguous {
                            key,
                            index: index + 1,
                            expected: max,
                            found: next.min_income,
                        });
                    }
                }
            }
        }

        Ok(Self { key, brackets })
    }

    pub fn key(&self) -> &TableKey {
        &self.key
    }

    /// Brackets in ascending order of lower bound.
    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }
}

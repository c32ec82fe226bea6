//! Marginal-rate lookup and progressive tax over bracket tables.
//!
//! Tables live in an immutable [`BracketTableSet`]. A lookup for a year with
//! no table falls back to the nearest year on record for the same
//! jurisdiction, filing status and tax type. When no table exists at all the
//! result carries a zero rate and `data_missing = true` instead of an error.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{ratio_or_zero, round_half_up};
use crate::models::{FilingStatusCode, Jurisdiction, TableKey, TaxBracketTable, TaxType};

/// An immutable snapshot of bracket tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketTableSet {
    tables: BTreeMap<TableKey, TaxBracketTable>,
}

impl BracketTableSet {
    pub fn new(tables: impl IntoIterator<Item = TaxBracketTable>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.key().clone(), t)).collect(),
        }
    }

    /// Adds `table`, replacing any table with the same key.
    pub fn insert(
        &mut self,
        table: TaxBracketTable,
    ) {
        self.tables.insert(table.key().clone(), table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TaxBracketTable> {
        self.tables.values()
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.tables.keys().map(|k| k.tax_year).collect()
    }

    /// The table for `key`, or for the nearest year with the same
    /// jurisdiction, status and type. Equal distance prefers the later year.
    pub fn select(
        &self,
        key: &TableKey,
    ) -> Option<&TaxBracketTable> {
        if let Some(table) = self.tables.get(key) {
            return Some(table);
        }
        self.tables
            .iter()
            .filter(|(k, _)| {
                k.jurisdiction == key.jurisdiction
                    && k.filing_status == key.filing_status
                    && k.tax_type == key.tax_type
            })
            .min_by_key(|(k, _)| ((k.tax_year - key.tax_year).abs(), -k.tax_year))
            .map(|(_, table)| table)
    }
}

/// Outcome of a marginal-rate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLookup {
    pub rate: Decimal,
    /// Year of the table actually used; `None` when no table applied.
    pub table_year: Option<i32>,
    pub data_missing: bool,
}

impl RateLookup {
    fn missing() -> Self {
        Self {
            rate: Decimal::ZERO,
            table_year: None,
            data_missing: true,
        }
    }

    fn no_tax() -> Self {
        Self {
            rate: Decimal::ZERO,
            table_year: None,
            data_missing: false,
        }
    }
}

/// Outcome of a progressive tax computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressiveTax {
    pub total_tax: Decimal,
    pub marginal_rate: Decimal,
    pub table_year: Option<i32>,
    pub data_missing: bool,
}

/// Bracket lookups over a borrowed table snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BracketEngine<'a> {
    tables: &'a BracketTableSet,
}

impl<'a> BracketEngine<'a> {
    pub fn new(tables: &'a BracketTableSet) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &'a BracketTableSet {
        self.tables
    }

    /// Marginal rate of the bracket containing `income`.
    ///
    /// States without an income tax resolve to a zero rate that is not
    /// flagged as missing data.
    pub fn marginal_rate(
        &self,
        jurisdiction: &Jurisdiction,
        tax_year: i32,
        filing_status: FilingStatusCode,
        tax_type: TaxType,
        income: Decimal,
    ) -> RateLookup {
        if !jurisdiction.has_income_tax() {
            return RateLookup::no_tax();
        }
        let key = TableKey {
            jurisdiction: jurisdiction.clone(),
            tax_year,
            filing_status,
            tax_type,
        };
        match self.tables.select(&key) {
            Some(table) => RateLookup {
                rate: marginal_rate_in(table, income),
                table_year: Some(table.key().tax_year),
                data_missing: false,
            },
            None => RateLookup::missing(),
        }
    }

    /// Total progressive tax on `income` plus the marginal rate it reaches.
    pub fn progressive_tax(
        &self,
        jurisdiction: &Jurisdiction,
        tax_year: i32,
        filing_status: FilingStatusCode,
        tax_type: TaxType,
        income: Decimal,
    ) -> ProgressiveTax {
        if !jurisdiction.has_income_tax() {
            return ProgressiveTax {
                total_tax: Decimal::ZERO,
                marginal_rate: Decimal::ZERO,
                table_year: None,
                data_missing: false,
            };
        }
        let key = TableKey {
            jurisdiction: jurisdiction.clone(),
            tax_year,
            filing_status,
            tax_type,
        };
        match self.tables.select(&key) {
            Some(table) => ProgressiveTax {
                total_tax: compute_progressive_tax(income, table),
                marginal_rate: marginal_rate_in(table, income),
                table_year: Some(table.key().tax_year),
                data_missing: false,
            },
            None => ProgressiveTax {
                total_tax: Decimal::ZERO,
                marginal_rate: Decimal::ZERO,
                table_year: None,
                data_missing: true,
            },
        }
    }
}

/// Resolves the marginal rate for `income`, with nearest-year fallback.
pub fn resolve_bracket_rate(
    jurisdiction: &Jurisdiction,
    tax_year: i32,
    filing_status: FilingStatusCode,
    tax_type: TaxType,
    income: Decimal,
    tables: &BracketTableSet,
) -> RateLookup {
    BracketEngine::new(tables).marginal_rate(jurisdiction, tax_year, filing_status, tax_type, income)
}

/// Rate of the first bracket whose inclusive range holds `income`.
///
/// Income below the first bracket takes the first bracket's rate.
pub fn marginal_rate_in(
    table: &TaxBracketTable,
    income: Decimal,
) -> Decimal {
    let brackets = table.brackets();
    brackets
        .iter()
        .find(|b| b.contains(income))
        .or_else(|| brackets.first())
        .map(|b| b.tax_rate)
        .unwrap_or(Decimal::ZERO)
}

/// Σ `rate × (min(income, max) − min)` over every bracket below `income`,
/// rounded to cents. Zero for income at or below zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vest_core::calculations::compute_progressive_tax;
/// use vest_core::{FilingStatusCode, Jurisdiction, TableKey, TaxBracket, TaxBracketTable, TaxType};
///
/// let key = TableKey {
///     jurisdiction: Jurisdiction::Federal,
///     tax_year: 2025,
///     filing_status: FilingStatusCode::Single,
///     tax_type: TaxType::Ordinary,
/// };
/// let table = TaxBracketTable::new(key, vec![
///     TaxBracket { min_income: dec!(0), max_income: Some(dec!(11925)), tax_rate: dec!(0.10) },
///     TaxBracket { min_income: dec!(11925), max_income: None, tax_rate: dec!(0.12) },
/// ]).unwrap();
///
/// assert_eq!(compute_progressive_tax(dec!(20000), &table), dec!(2161.50));
/// ```
pub fn compute_progressive_tax(
    income: Decimal,
    table: &TaxBracketTable,
) -> Decimal {
    if income <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let tax: Decimal = table
        .brackets()
        .iter()
        .take_while(|b| b.min_income < income)
        .map(|b| {
            let upper = b.max_income.map_or(income, |max| max.min(income));
            b.tax_rate * (upper - b.min_income)
        })
        .sum();
    round_half_up(tax)
}

/// Progressive tax on `income` divided by `income`; zero for income at or below zero.
pub fn effective_rate(
    income: Decimal,
    table: &TaxBracketTable,
) -> Decimal {
    if income <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ratio_or_zero(compute_progressive_tax(income, table), income)
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::fixtures::*;
    use super::*;

    // =========================================================================
    // BracketTableSet::select tests
    // =========================================================================

    fn key(tax_year: i32) -> TableKey {
        TableKey {
            jurisdiction: Jurisdiction::Federal,
            tax_year,
            filing_status: FilingStatusCode::Single,
            tax_type: TaxType::Ordinary,
        }
    }

    #[test]
    fn select_returns_exact_year() {
        let set = BracketTableSet::new([
            federal_ordinary_single(2024),
            federal_ordinary_single(2025),
        ]);

        let result = set.select(&key(2024)).map(|t| t.key().tax_year);

        assert_eq!(result, Some(2024));
    }

    #[test]
    fn select_falls_back_to_nearest_year() {
        let set = BracketTableSet::new([
            federal_ordinary_single(2022),
            federal_ordinary_single(2025),
        ]);

        assert_eq!(set.select(&key(2028)).map(|t| t.key().tax_year), Some(2025));
        assert_eq!(set.select(&key(2020)).map(|t| t.key().tax_year), Some(2022));
    }

    #[test]
    fn select_prefers_later_year_on_tie() {
        let set = BracketTableSet::new([
            federal_ordinary_single(2024),
            federal_ordinary_single(2026),
        ]);

        let result = set.select(&key(2025)).map(|t| t.key().tax_year);

        assert_eq!(result, Some(2026));
    }

    #[test]
    fn select_ignores_other_statuses_and_types() {
        let set = BracketTableSet::new([federal_ltcg_single(2025)]);

        assert_eq!(set.select(&key(2025)), None);
    }

    // =========================================================================
    // Marginal rate tests
    // =========================================================================

    #[test]
    fn marginal_rate_inside_bracket() {
        let result = marginal_rate_in(&federal_ordinary_single(2025), dec!(150000));

        assert_eq!(result, dec!(0.24));
    }

    #[test]
    fn marginal_rate_at_upper_bound_uses_lower_bracket() {
        let result = marginal_rate_in(&federal_ordinary_single(2025), dec!(48475));

        assert_eq!(result, dec!(0.12));
    }

    #[test]
    fn marginal_rate_in_top_bracket() {
        let result = marginal_rate_in(&federal_ordinary_single(2025), dec!(5000000));

        assert_eq!(result, dec!(0.37));
    }

    #[test]
    fn marginal_rate_below_first_bracket_uses_first_rate() {
        let result = marginal_rate_in(&federal_ordinary_single(2025), dec!(-100));

        assert_eq!(result, dec!(0.10));
    }

    #[test]
    fn resolve_bracket_rate_reports_table_year() {
        let set = table_set_2025();

        let result = resolve_bracket_rate(
            &Jurisdiction::Federal,
            2027,
            FilingStatusCode::Single,
            TaxType::LongTermCapitalGains,
            dec!(100000),
            &set,
        );

        assert_eq!(
            result,
            RateLookup {
                rate: dec!(0.15),
                table_year: Some(2025),
                data_missing: false
            }
        );
    }

    #[test]
    fn resolve_bracket_rate_flags_missing_data() {
        let set = table_set_2025();

        let result = resolve_bracket_rate(
            &Jurisdiction::state("NY"),
            2025,
            FilingStatusCode::Single,
            TaxType::Ordinary,
            dec!(100000),
            &set,
        );

        assert_eq!(result, RateLookup::missing());
    }

    #[test]
    fn resolve_bracket_rate_no_income_tax_state_is_not_missing() {
        let set = BracketTableSet::default();

        let result = resolve_bracket_rate(
            &Jurisdiction::state("WA"),
            2025,
            FilingStatusCode::Single,
            TaxType::Ordinary,
            dec!(100000),
            &set,
        );

        assert_eq!(result, RateLookup::no_tax());
    }

    // =========================================================================
    // Progressive tax tests
    // =========================================================================

    #[test]
    fn progressive_tax_returns_zero_for_zero_income() {
        let result = compute_progressive_tax(dec!(0), &federal_ordinary_single(2025));

        assert_eq!(result, dec!(0));
    }

    #[test]
    fn progressive_tax_first_bracket() {
        let result = compute_progressive_tax(dec!(10000), &federal_ordinary_single(2025));

        assert_eq!(result, dec!(1000.00));
    }

    #[test]
    fn progressive_tax_at_bracket_boundary() {
        let result = compute_progressive_tax(dec!(48475), &federal_ordinary_single(2025));

        // 11925 × 10% + 36550 × 12%
        assert_eq!(result, dec!(5578.50));
    }

    #[test]
    fn progressive_tax_spans_several_brackets() {
        let result = compute_progressive_tax(dec!(150000), &federal_ordinary_single(2025));

        // 1192.50 + 4386.00 + 12072.50 + 11196.00
        assert_eq!(result, dec!(28847.00));
    }

    #[test]
    fn progressive_tax_in_top_bracket() {
        let result = compute_progressive_tax(dec!(1000000), &federal_ordinary_single(2025));

        assert_eq!(result, dec!(327020.25));
    }

    #[test]
    fn progressive_tax_rounds_half_up() {
        let result = compute_progressive_tax(dec!(10412.25), &california_single(2025));

        // 10412 × 1% + 0.25 × 2% = 104.125
        assert_eq!(result, dec!(104.13));
    }

    #[test]
    fn engine_progressive_tax_flags_missing_table() {
        let set = BracketTableSet::default();
        let engine = BracketEngine::new(&set);

        let result = engine.progressive_tax(
            &Jurisdiction::Federal,
            2025,
            FilingStatusCode::Single,
            TaxType::Ordinary,
            dec!(50000),
        );

        assert!(result.data_missing);
        assert_eq!(result.total_tax, dec!(0));
    }

    #[test]
    fn engine_progressive_tax_reports_marginal_rate() {
        let set = table_set_2025();
        let engine = BracketEngine::new(&set);

        let result = engine.progressive_tax(
            &Jurisdiction::state("CA"),
            2025,
            FilingStatusCode::Single,
            TaxType::Ordinary,
            dec!(100000),
        );

        assert_eq!(result.marginal_rate, dec!(0.093));
        assert_eq!(result.table_year, Some(2025));
        assert!(!result.data_missing);
    }

    #[test]
    fn effective_rate_divides_tax_by_income() {
        let result = effective_rate(dec!(10000), &federal_ordinary_single(2025));

        assert_eq!(result, dec!(0.1));
    }

    #[test]
    fn effective_rate_is_zero_for_zero_income() {
        let result = effective_rate(dec!(0), &federal_ordinary_single(2025));

        assert_eq!(result, dec!(0));
    }
}

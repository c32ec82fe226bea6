//! Capital gains tax on a sale.
//!
//! Rates are looked up at the filer's total annual income (salary, vests and
//! every gain for the year), never stacked on top of ordinary income. Long-term
//! gains use the federal long-term table, short-term gains the federal
//! ordinary table, both for the year of the sale. A caller with manual rates
//! supplies both federal rates instead. NIIT applies to the lesser of the
//! gain and the income above the filing-status threshold.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::brackets::{BracketEngine, BracketTableSet};
use crate::calculations::common::{max, ratio_or_zero, round_half_up};
use crate::models::{FilingStatusCode, Jurisdiction, TaxType, TaxYearConfigSet};

/// Holding periods longer than this many days are long-term.
pub const LONG_TERM_HOLDING_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
}

impl HoldingPeriod {
    pub fn is_long_term(&self) -> bool {
        *self == Self::LongTerm
    }
}

/// Days between acquisition and disposition.
pub fn holding_days(
    acquisition_date: NaiveDate,
    disposition_date: NaiveDate,
) -> i64 {
    (disposition_date - acquisition_date).num_days()
}

/// Long-term iff the shares were held more than 365 days.
pub fn classify_holding_period(
    acquisition_date: NaiveDate,
    disposition_date: NaiveDate,
) -> HoldingPeriod {
    if holding_days(acquisition_date, disposition_date) > LONG_TERM_HOLDING_DAYS {
        HoldingPeriod::LongTerm
    } else {
        HoldingPeriod::ShortTerm
    }
}

/// `shares × (sale_price − cost_basis_per_share) − fees`, rounded to cents.
pub fn sale_gain(
    shares: Decimal,
    sale_price: Decimal,
    cost_basis_per_share: Decimal,
    fees: Decimal,
) -> Decimal {
    round_half_up(shares * (sale_price - cost_basis_per_share) - fees)
}

/// Whether an ISO sale is a qualifying disposition: strictly more than two
/// years after grant and more than one year after exercise.
pub fn is_qualifying_disposition(
    grant_date: NaiveDate,
    exercise_date: NaiveDate,
    sale_date: NaiveDate,
) -> bool {
    let after = |date: NaiveDate, months: u32| {
        date.checked_add_months(Months::new(months))
            .is_some_and(|anniversary| sale_date > anniversary)
    };
    after(grant_date, 24) && after(exercise_date, 12)
}

/// Taxes owed on one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalGainsResult {
    pub gain: Decimal,
    pub holding_period: HoldingPeriod,
    pub holding_days: i64,
    pub tax_year: i32,
    pub federal_rate: Decimal,
    pub federal_tax: Decimal,
    /// NIIT rate, or zero when no NIIT is owed.
    pub niit_rate: Decimal,
    pub niit_tax: Decimal,
    pub state_rate: Decimal,
    pub state_tax: Decimal,
    pub total_tax: Decimal,
    /// Total tax over gain; zero for a zero gain.
    pub effective_rate: Decimal,
    /// Gain after all taxes.
    pub net_gain: Decimal,
    pub data_missing: bool,
}

/// Federal rates that replace the bracket lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederalGainRates {
    pub short_term: Decimal,
    pub long_term: Decimal,
}

impl FederalGainRates {
    pub fn for_period(&self, holding_period: HoldingPeriod) -> Decimal {
        match holding_period {
            HoldingPeriod::ShortTerm => self.short_term,
            HoldingPeriod::LongTerm => self.long_term,
        }
    }
}

/// Capital gains calculator over a table and year-constant snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CapitalGainsCalculator<'a> {
    brackets: BracketEngine<'a>,
    configs: &'a TaxYearConfigSet,
    federal_rates: Option<FederalGainRates>,
}

impl<'a> CapitalGainsCalculator<'a> {
    pub fn new(
        tables: &'a BracketTableSet,
        configs: &'a TaxYearConfigSet,
    ) -> Self {
        Self {
            brackets: BracketEngine::new(tables),
            configs,
            federal_rates: None,
        }
    }

    /// Uses `rates` for the federal tax instead of the bracket tables.
    pub fn with_federal_rates(
        mut self,
        rates: FederalGainRates,
    ) -> Self {
        self.federal_rates = Some(rates);
        self
    }

    /// Computes the taxes on `gain`.
    ///
    /// `state_rate` is the caller's marginal state rate; `None` means no
    /// state tax. Gains at or below zero owe nothing.
    pub fn compute(
        &self,
        gain: Decimal,
        acquisition_date: NaiveDate,
        disposition_date: NaiveDate,
        total_annual_income: Decimal,
        filing_status: FilingStatusCode,
        state_rate: Option<Decimal>,
    ) -> CapitalGainsResult {
        let holding_period = classify_holding_period(acquisition_date, disposition_date);
        let holding_days = holding_days(acquisition_date, disposition_date);
        let tax_year = disposition_date.year();

        if gain <= Decimal::ZERO {
            return CapitalGainsResult {
                gain,
                holding_period,
                holding_days,
                tax_year,
                federal_rate: Decimal::ZERO,
                federal_tax: Decimal::ZERO,
                niit_rate: Decimal::ZERO,
                niit_tax: Decimal::ZERO,
                state_rate: Decimal::ZERO,
                state_tax: Decimal::ZERO,
                total_tax: Decimal::ZERO,
                effective_rate: Decimal::ZERO,
                net_gain: gain,
                data_missing: false,
            };
        }

        let (federal_rate, federal_missing) = match self.federal_rates {
            Some(rates) => (rates.for_period(holding_period), false),
            None => {
                let tax_type = if holding_period.is_long_term() {
                    TaxType::LongTermCapitalGains
                } else {
                    TaxType::Ordinary
                };
                let lookup = self.brackets.marginal_rate(
                    &Jurisdiction::Federal,
                    tax_year,
                    filing_status,
                    tax_type,
                    total_annual_income,
                );
                (lookup.rate, lookup.data_missing)
            }
        };
        let federal_tax = round_half_up(gain * federal_rate);

        let (niit_rate, niit_tax, niit_missing) =
            self.niit(gain, total_annual_income, filing_status, tax_year);

        let state_rate = state_rate.unwrap_or(Decimal::ZERO);
        let state_tax = round_half_up(gain * state_rate);

        let total_tax = federal_tax + niit_tax + state_tax;

        CapitalGainsResult {
            gain,
            holding_period,
            holding_days,
            tax_year,
            federal_rate,
            federal_tax,
            niit_rate,
            niit_tax,
            state_rate,
            state_tax,
            total_tax,
            effective_rate: ratio_or_zero(total_tax, gain),
            net_gain: gain - total_tax,
            data_missing: federal_missing || niit_missing,
        }
    }

    /// Returns `(rate, tax, data_missing)`.
    fn niit(
        &self,
        gain: Decimal,
        total_annual_income: Decimal,
        filing_status: FilingStatusCode,
        tax_year: i32,
    ) -> (Decimal, Decimal, bool) {
        let Some(config) = self.configs.for_year(tax_year) else {
            return (Decimal::ZERO, Decimal::ZERO, true);
        };
        let threshold = config.thresholds_for(filing_status).niit_threshold;
        if total_annual_income <= threshold {
            return (Decimal::ZERO, Decimal::ZERO, false);
        }
        let subject = gain.min(max(total_annual_income - threshold, Decimal::ZERO));
        let tax = round_half_up(subject * config.niit_rate);
        let rate = if tax > Decimal::ZERO {
            config.niit_rate
        } else {
            Decimal::ZERO
        };
        (rate, tax, false)
    }
}

/// Computes capital gains tax against the given snapshot.
#[allow(clippy::too_many_arguments)]
pub fn compute_capital_gains_tax(
    gain: Decimal,
    acquisition_date: NaiveDate,
    disposition_date: NaiveDate,
    total_annual_income: Decimal,
    filing_status: FilingStatusCode,
    state_rate: Option<Decimal>,
    tables: &BracketTableSet,
    configs: &TaxYearConfigSet,
) -> CapitalGainsResult {
    CapitalGainsCalculator::new(tables, configs).compute(
        gain,
        acquisition_date,
        disposition_date,
        total_annual_income,
        filing_status,
        state_rate,
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::brackets::fixtures::table_set_2025;
    use crate::models::fixtures::config_2026;

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn compute(
        gain: Decimal,
        acquired: NaiveDate,
        disposed: NaiveDate,
        income: Decimal,
        state_rate: Option<Decimal>,
    ) -> CapitalGainsResult {
        let tables = table_set_2025();
        let configs = TaxYearConfigSet::new([config_2026()]);
        compute_capital_gains_tax(
            gain,
            acquired,
            disposed,
            income,
            FilingStatusCode::Single,
            state_rate,
            &tables,
            &configs,
        )
    }

    // =========================================================================
    // Holding period tests
    // =========================================================================

    #[test]
    fn holding_365_days_is_short_term() {
        let acquired = date(2024, 1, 1);
        let disposed = date(2024, 12, 31);

        assert_eq!(holding_days(acquired, disposed), 365);
        assert_eq!(classify_holding_period(acquired, disposed), HoldingPeriod::ShortTerm);
    }

    #[test]
    fn holding_366_days_is_long_term() {
        let acquired = date(2024, 1, 1);
        let disposed = date(2025, 1, 1);

        assert_eq!(holding_days(acquired, disposed), 366);
        assert_eq!(classify_holding_period(acquired, disposed), HoldingPeriod::LongTerm);
    }

    #[test]
    fn qualifying_disposition_needs_both_anniversaries() {
        let grant = date(2022, 1, 15);
        let exercise = date(2023, 6, 1);

        assert!(is_qualifying_disposition(grant, exercise, date(2024, 6, 2)));
        assert!(!is_qualifying_disposition(grant, exercise, date(2024, 6, 1)));
        assert!(!is_qualifying_disposition(grant, date(2022, 1, 15), date(2024, 1, 15)));
    }

    #[test]
    fn sale_gain_subtracts_basis_and_fees() {
        let result = sale_gain(dec!(100), dec!(55.25), dec!(42.50), dec!(9.99));

        assert_eq!(result, dec!(1265.01));
    }

    // =========================================================================
    // compute tests
    // =========================================================================

    #[test]
    fn long_term_gain_uses_ltcg_table() {
        let result = compute(
            dec!(10000),
            date(2024, 1, 1),
            date(2025, 3, 1),
            dec!(150000),
            Some(dec!(0.093)),
        );

        assert_eq!(result.holding_period, HoldingPeriod::LongTerm);
        assert_eq!(result.tax_year, 2025);
        assert_eq!(result.federal_rate, dec!(0.15));
        assert_eq!(result.federal_tax, dec!(1500.00));
        assert_eq!(result.niit_tax, dec!(0));
        assert_eq!(result.niit_rate, dec!(0));
        assert_eq!(result.state_tax, dec!(930.00));
        assert_eq!(result.total_tax, dec!(2430.00));
        assert_eq!(result.effective_rate, dec!(0.243));
        assert_eq!(result.net_gain, dec!(7570.00));
        assert!(!result.data_missing);
    }

    #[test]
    fn long_term_rate_uses_total_income_not_gain() {
        let result = compute(dec!(1000), date(2020, 1, 1), date(2025, 1, 1), dec!(40000), None);

        assert_eq!(result.federal_rate, dec!(0.00));
        assert_eq!(result.federal_tax, dec!(0));
    }

    #[test]
    fn short_term_gain_uses_ordinary_table() {
        let result = compute(dec!(10000), date(2025, 1, 1), date(2025, 6, 1), dec!(150000), None);

        assert_eq!(result.holding_period, HoldingPeriod::ShortTerm);
        assert_eq!(result.federal_rate, dec!(0.24));
        assert_eq!(result.federal_tax, dec!(2400.00));
        assert_eq!(result.state_tax, dec!(0));
    }

    #[test]
    fn niit_applies_to_lesser_of_gain_and_excess() {
        let result = compute(dec!(10000), date(2020, 1, 1), date(2025, 1, 1), dec!(205000), None);

        assert_eq!(result.niit_tax, dec!(190.00));
        assert_eq!(result.niit_rate, dec!(0.038));
    }

    #[test]
    fn niit_on_full_gain_well_above_threshold() {
        let result = compute(dec!(10000), date(2020, 1, 1), date(2025, 1, 1), dec!(600000), None);

        assert_eq!(result.niit_tax, dec!(380.00));
        assert_eq!(result.federal_rate, dec!(0.20));
    }

    #[test]
    fn niit_zero_at_threshold_regardless_of_gain() {
        let result = compute(dec!(5000000), date(2020, 1, 1), date(2025, 1, 1), dec!(200000), None);

        assert_eq!(result.niit_tax, dec!(0));
    }

    #[test]
    fn loss_owes_nothing() {
        let result = compute(dec!(-2500), date(2020, 1, 1), date(2025, 1, 1), dec!(600000), Some(dec!(0.093)));

        assert_eq!(result.total_tax, dec!(0));
        assert_eq!(result.effective_rate, dec!(0));
        assert_eq!(result.net_gain, dec!(-2500));
        assert_eq!(result.holding_period, HoldingPeriod::LongTerm);
    }

    #[test]
    fn zero_gain_has_zero_effective_rate() {
        let result = compute(dec!(0), date(2024, 1, 1), date(2025, 3, 1), dec!(150000), None);

        assert_eq!(result.effective_rate, dec!(0));
        assert_eq!(result.total_tax, dec!(0));
    }

    #[test]
    fn missing_tables_flag_data_missing() {
        let tables = BracketTableSet::default();
        let configs = TaxYearConfigSet::default();

        let result = compute_capital_gains_tax(
            dec!(10000),
            date(2024, 1, 1),
            date(2025, 3, 1),
            dec!(300000),
            FilingStatusCode::Single,
            Some(dec!(0.05)),
            &tables,
            &configs,
        );

        assert!(result.data_missing);
        assert_eq!(result.federal_tax, dec!(0));
        assert_eq!(result.niit_tax, dec!(0));
        assert_eq!(result.state_tax, dec!(500.00));
    }

    #[test]
    fn federal_rates_replace_bracket_lookup() {
        let tables = table_set_2025();
        let configs = TaxYearConfigSet::new([config_2026()]);
        let calculator = CapitalGainsCalculator::new(&tables, &configs).with_federal_rates(
            FederalGainRates {
                short_term: dec!(0.30),
                long_term: dec!(0.10),
            },
        );

        let long = calculator.compute(
            dec!(10000),
            date(2024, 1, 1),
            date(2025, 3, 1),
            dec!(150000),
            FilingStatusCode::Single,
            None,
        );
        let short = calculator.compute(
            dec!(10000),
            date(2025, 1, 1),
            date(2025, 6, 1),
            dec!(150000),
            FilingStatusCode::Single,
            None,
        );

        assert_eq!(long.federal_rate, dec!(0.10));
        assert_eq!(long.federal_tax, dec!(1000.00));
        assert_eq!(short.federal_rate, dec!(0.30));
        assert_eq!(short.federal_tax, dec!(3000.00));
    }

    #[test]
    fn federal_rates_need_no_tables() {
        let tables = BracketTableSet::default();
        let configs = TaxYearConfigSet::new([config_2026()]);

        let result = CapitalGainsCalculator::new(&tables, &configs)
            .with_federal_rates(FederalGainRates {
                short_term: dec!(0.22),
                long_term: dec!(0.15),
            })
            .compute(
                dec!(10000),
                date(2024, 1, 1),
                date(2025, 3, 1),
                dec!(150000),
                FilingStatusCode::Single,
                None,
            );

        assert_eq!(result.federal_tax, dec!(1500.00));
        assert!(!result.data_missing);
    }
}

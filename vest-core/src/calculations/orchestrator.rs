//! Combines the calculators into one tax breakdown per income event.
//!
//! Rates come either from the bracket tables at the profile's marginal
//! income ([`RateMode::MarginalProgressive`]) or from effective rates the
//! caller already knows for a closed year ([`RateMode::Effective`]). The
//! mode is always passed in explicitly.
//!
//! When state levies are attached, the state surcharge joins the state rate
//! and SDI is withheld alongside FICA.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::brackets::{BracketEngine, BracketTableSet};
use crate::calculations::capital_gains::{
    CapitalGainsCalculator, CapitalGainsResult, FederalGainRates,
};
use crate::calculations::common::{max, ratio_or_zero, round_half_up};
use crate::calculations::fica::{FicaCalculator, FicaConfig, FicaResult};
use crate::calculations::state_levies::{SdiResult, compute_sdi, surcharge_rate_at, surcharge_tax};
use crate::models::{
    GrantCategory, GrantTerms, Jurisdiction, ShareCategory, StateLevyConfig, StateLevySet,
    TaxProfile, TaxType, TaxYearConfigSet, VestEvent,
};

/// Federal ordinary rate used when a manual override leaves it blank or the
/// profile has no income to look up.
pub const DEFAULT_FEDERAL_RATE: Decimal = Decimal::from_parts(22, 0, 0, false, 2);

/// State rate used in the same situations as [`DEFAULT_FEDERAL_RATE`].
pub const DEFAULT_STATE_RATE: Decimal = Decimal::from_parts(93, 0, 0, false, 3);

/// Long-term capital gains rate used in the same situations as [`DEFAULT_FEDERAL_RATE`].
pub const DEFAULT_LTCG_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

/// Pre-computed effective rates for a year whose total income is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRates {
    pub federal: Decimal,
    pub state: Decimal,
    #[serde(default)]
    pub data_missing: bool,
}

impl EffectiveRates {
    pub fn new(
        federal: Decimal,
        state: Decimal,
    ) -> Self {
        Self {
            federal,
            state,
            data_missing: false,
        }
    }

    /// Progressive tax over `total_income` divided by `total_income`, for
    /// the federal ordinary table and the profile's state table.
    pub fn from_known_income(
        tables: &BracketTableSet,
        profile: &TaxProfile,
        tax_year: i32,
        total_income: Decimal,
    ) -> Self {
        let engine = BracketEngine::new(tables);
        let effective = |jurisdiction: &Jurisdiction| {
            let tax = engine.progressive_tax(
                jurisdiction,
                tax_year,
                profile.filing_status,
                TaxType::Ordinary,
                total_income,
            );
            let rate = if total_income > Decimal::ZERO {
                ratio_or_zero(tax.total_tax, total_income)
            } else {
                Decimal::ZERO
            };
            (rate, tax.data_missing)
        };

        let (federal, federal_missing) = effective(&Jurisdiction::Federal);
        let (state, state_missing) = profile
            .state_jurisdiction()
            .map_or((Decimal::ZERO, false), |j| effective(&j));

        Self {
            federal,
            state,
            data_missing: federal_missing || state_missing,
        }
    }
}

/// How rates are chosen for a breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateMode {
    /// Marginal rates from the bracket tables at the profile's income.
    MarginalProgressive,
    /// Caller-supplied effective rates.
    Effective(EffectiveRates),
}

/// Where the rates in a breakdown came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    Manual,
    Brackets,
    /// The profile had no income to look up, so defaults were used.
    Default,
    Effective,
}

/// Federal, state and long-term capital gains rates for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRates {
    pub federal: Decimal,
    pub state: Decimal,
    pub ltcg: Decimal,
    pub source: RateSource,
    /// Year of the federal table used, when brackets were consulted.
    pub table_year: Option<i32>,
    pub data_missing: bool,
}

/// Income a vest event produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestValuation {
    /// Ordinary wage income recognized at vest.
    pub wage_income: Decimal,
    /// ISO bargain element, an AMT preference item with no regular wage tax.
    pub amt_preference: Decimal,
}

/// Tax on one income event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub gross_value: Decimal,
    pub tax_year: i32,
    pub federal_rate: Decimal,
    pub federal_tax: Decimal,
    pub state_rate: Decimal,
    pub state_tax: Decimal,
    pub social_security: Decimal,
    pub medicare: Decimal,
    pub additional_medicare: Decimal,
    pub total_fica: Decimal,
    /// State disability insurance withheld with payroll taxes.
    pub state_sdi: Decimal,
    pub total_tax: Decimal,
    pub net_amount: Decimal,
    /// Total tax over gross value; zero for a zero gross value.
    pub effective_rate: Decimal,
    pub amt_preference: Decimal,
    pub rate_source: RateSource,
    pub data_missing: bool,
}

/// Tax engine over one reference-data snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TaxOrchestrator<'a> {
    brackets: BracketEngine<'a>,
    configs: &'a TaxYearConfigSet,
    states: Option<&'a StateLevySet>,
}

impl<'a> TaxOrchestrator<'a> {
    pub fn new(
        tables: &'a BracketTableSet,
        configs: &'a TaxYearConfigSet,
    ) -> Self {
        Self {
            brackets: BracketEngine::new(tables),
            configs,
            states: None,
        }
    }

    /// Applies state surcharges and SDI from `states`.
    pub fn with_state_levies(
        mut self,
        states: &'a StateLevySet,
    ) -> Self {
        self.states = Some(states);
        self
    }

    /// Effective rates over a known total income, surcharge included.
    pub fn effective_rates(
        &self,
        profile: &TaxProfile,
        tax_year: i32,
        total_income: Decimal,
    ) -> EffectiveRates {
        let mut rates = EffectiveRates::from_known_income(
            self.brackets.tables(),
            profile,
            tax_year,
            total_income,
        );
        if let Some(levy) = self.state_levy(profile, tax_year) {
            rates.state += ratio_or_zero(surcharge_tax(levy, total_income), total_income);
        }
        rates
    }

    /// Rates for `tax_year` at the profile's own annual income.
    pub fn resolve_rates(
        &self,
        profile: &TaxProfile,
        tax_year: i32,
    ) -> ResolvedRates {
        if profile.use_manual_rates {
            return manual_rates(profile);
        }
        match profile.annual_income {
            Some(income) if income > Decimal::ZERO => self.bracket_rates(profile, tax_year, income),
            _ => default_rates(profile),
        }
    }

    /// Rates for `tax_year` at an explicit `income`, ignoring the profile's own.
    ///
    /// Manual overrides still win.
    pub fn resolve_rates_for_income(
        &self,
        profile: &TaxProfile,
        tax_year: i32,
        income: Decimal,
    ) -> ResolvedRates {
        if profile.use_manual_rates {
            return manual_rates(profile);
        }
        self.bracket_rates(profile, tax_year, income)
    }

    fn bracket_rates(
        &self,
        profile: &TaxProfile,
        tax_year: i32,
        income: Decimal,
    ) -> ResolvedRates {
        let lookup = |jurisdiction: &Jurisdiction, tax_type: TaxType| {
            self.brackets
                .marginal_rate(jurisdiction, tax_year, profile.filing_status, tax_type, income)
        };
        let federal = lookup(&Jurisdiction::Federal, TaxType::Ordinary);
        let ltcg = lookup(&Jurisdiction::Federal, TaxType::LongTermCapitalGains);
        let (mut state, state_missing) = match profile.state_jurisdiction() {
            Some(j) => {
                let r = lookup(&j, TaxType::Ordinary);
                (r.rate, r.data_missing)
            }
            None => (Decimal::ZERO, false),
        };
        if let Some(levy) = self.state_levy(profile, tax_year) {
            state += surcharge_rate_at(levy, income);
        }

        ResolvedRates {
            federal: federal.rate,
            state,
            ltcg: ltcg.rate,
            source: RateSource::Brackets,
            table_year: federal.table_year,
            data_missing: federal.data_missing || ltcg.data_missing || state_missing,
        }
    }

    /// Values a vest event at `price_at_vest`.
    ///
    /// | Grant            | Wage income | AMT preference |
    /// |------------------|-------------|----------------|
    /// | Purchase plans   | Discount gain, pro-rated to the event | 0 |
    /// | Restricted stock | shares × price | 0 |
    /// | Cash             | shares (already USD) | 0 |
    /// | Options          | 0 | shares × max(0, price − strike) |
    pub fn value_vest_event(
        &self,
        grant: &GrantTerms,
        event: &VestEvent,
        price_at_vest: Decimal,
    ) -> VestValuation {
        let shares = event.shares_vested;
        if matches!(
            grant.category,
            GrantCategory::PurchasePlan | GrantCategory::NonQualifiedPurchasePlan
        ) {
            let share_of_grant = ratio_or_zero(shares, grant.quantity);
            return VestValuation {
                wage_income: round_half_up(grant.purchase_discount_gain() * share_of_grant),
                amt_preference: Decimal::ZERO,
            };
        }
        match grant.share_category {
            ShareCategory::Restricted => VestValuation {
                wage_income: round_half_up(shares * price_at_vest),
                amt_preference: Decimal::ZERO,
            },
            ShareCategory::Cash => VestValuation {
                wage_income: round_half_up(shares),
                amt_preference: Decimal::ZERO,
            },
            ShareCategory::Iso5Year | ShareCategory::Iso6Year => VestValuation {
                wage_income: Decimal::ZERO,
                amt_preference: round_half_up(
                    shares * max(price_at_vest - grant.price_at_grant, Decimal::ZERO),
                ),
            },
        }
    }

    /// Tax on `gross_value` of wage income in `tax_year`.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use vest_core::calculations::{BracketTableSet, EffectiveRates, RateMode, TaxOrchestrator};
    /// use vest_core::{FilingStatusCode, TaxProfile, TaxYearConfigSet};
    ///
    /// let tables = BracketTableSet::default();
    /// let configs = TaxYearConfigSet::default();
    /// let orchestrator = TaxOrchestrator::new(&tables, &configs);
    /// let profile = TaxProfile {
    ///     include_fica: false,
    ///     ..TaxProfile::new(FilingStatusCode::Single)
    /// };
    ///
    /// let result = orchestrator.breakdown(
    ///     dec!(10000),
    ///     2024,
    ///     &profile,
    ///     &RateMode::Effective(EffectiveRates::new(dec!(0.18), dec!(0.06))),
    /// );
    ///
    /// assert_eq!(result.total_tax, dec!(2400.00));
    /// assert_eq!(result.net_amount, dec!(7600.00));
    /// ```
    pub fn breakdown(
        &self,
        gross_value: Decimal,
        tax_year: i32,
        profile: &TaxProfile,
        mode: &RateMode,
    ) -> TaxBreakdown {
        let (federal_rate, state_rate, rate_source, rates_missing) = match mode {
            RateMode::Effective(rates) => {
                (rates.federal, rates.state, RateSource::Effective, rates.data_missing)
            }
            RateMode::MarginalProgressive => {
                let rates = self.resolve_rates(profile, tax_year);
                (rates.federal, rates.state, rates.source, rates.data_missing)
            }
        };

        let federal_tax = round_half_up(gross_value * federal_rate);
        let state_tax = round_half_up(gross_value * state_rate);
        let (fica, fica_missing) = self.fica(gross_value, tax_year, profile);
        let sdi = self.sdi(gross_value, tax_year, profile);

        let total_tax = federal_tax + state_tax + fica.total + sdi.sdi;

        TaxBreakdown {
            gross_value,
            tax_year,
            federal_rate,
            federal_tax,
            state_rate,
            state_tax,
            social_security: fica.social_security,
            medicare: fica.medicare,
            additional_medicare: fica.additional_medicare,
            total_fica: fica.total,
            state_sdi: sdi.sdi,
            total_tax,
            net_amount: gross_value - total_tax,
            effective_rate: ratio_or_zero(total_tax, gross_value),
            amt_preference: Decimal::ZERO,
            rate_source,
            data_missing: rates_missing || fica_missing,
        }
    }

    /// Values `event` and computes its tax breakdown.
    pub fn breakdown_for_vest(
        &self,
        grant: &GrantTerms,
        event: &VestEvent,
        price_at_vest: Decimal,
        profile: &TaxProfile,
        mode: &RateMode,
    ) -> TaxBreakdown {
        let valuation = self.value_vest_event(grant, event, price_at_vest);
        TaxBreakdown {
            amt_preference: valuation.amt_preference,
            ..self.breakdown(valuation.wage_income, event.tax_year, profile, mode)
        }
    }

    /// Capital gains on a sale, with the state rate resolved from the profile
    /// at `total_annual_income` for the year of the sale.
    ///
    /// Manual profiles use their own ordinary rate for short-term gains and
    /// their long-term rate for long-term gains.
    pub fn capital_gains(
        &self,
        gain: Decimal,
        acquisition_date: NaiveDate,
        disposition_date: NaiveDate,
        total_annual_income: Decimal,
        profile: &TaxProfile,
    ) -> CapitalGainsResult {
        let rates =
            self.resolve_rates_for_income(profile, disposition_date.year(), total_annual_income);
        let mut calculator = CapitalGainsCalculator::new(self.brackets.tables(), self.configs);
        if rates.source == RateSource::Manual {
            calculator = calculator.with_federal_rates(FederalGainRates {
                short_term: rates.federal,
                long_term: rates.ltcg,
            });
        }
        let mut result = calculator.compute(
            gain,
            acquisition_date,
            disposition_date,
            total_annual_income,
            profile.filing_status,
            Some(rates.state),
        );
        result.data_missing |= gain > Decimal::ZERO && rates.data_missing;
        result
    }

    /// FICA on the event, or zero when the profile opts out.
    fn fica(
        &self,
        gross_value: Decimal,
        tax_year: i32,
        profile: &TaxProfile,
    ) -> (FicaResult, bool) {
        if !profile.include_fica || gross_value <= Decimal::ZERO {
            return (FicaResult::zero(), false);
        }
        let Some(config) = self.configs.for_year(tax_year) else {
            return (FicaResult::zero(), true);
        };
        let result = FicaCalculator::new(FicaConfig::from_tax_year_config(config)).compute(
            gross_value,
            profile.annual_income.unwrap_or(Decimal::ZERO),
            profile.filing_status,
            profile.ytd_wages,
        );
        (result, false)
    }

    /// SDI on the event; zero without payroll taxes or a levy for the state.
    fn sdi(
        &self,
        gross_value: Decimal,
        tax_year: i32,
        profile: &TaxProfile,
    ) -> SdiResult {
        if !profile.include_fica {
            return SdiResult::zero();
        }
        self.state_levy(profile, tax_year)
            .map_or_else(SdiResult::zero, |levy| compute_sdi(levy, gross_value, profile.ytd_wages))
    }

    fn state_levy(
        &self,
        profile: &TaxProfile,
        tax_year: i32,
    ) -> Option<&'a StateLevyConfig> {
        let jurisdiction = profile.state_jurisdiction()?;
        self.states?.for_state(&jurisdiction, tax_year)
    }
}

fn manual_rates(profile: &TaxProfile) -> ResolvedRates {
    ResolvedRates {
        federal: profile.manual_federal_rate.unwrap_or(DEFAULT_FEDERAL_RATE),
        state: profile
            .manual_state_rate
            .unwrap_or_else(|| default_state_rate(profile)),
        ltcg: profile.manual_ltcg_rate.unwrap_or(DEFAULT_LTCG_RATE),
        source: RateSource::Manual,
        table_year: None,
        data_missing: false,
    }
}

/// Zero for states without an income tax.
fn default_state_rate(profile: &TaxProfile) -> Decimal {
    match profile.state_jurisdiction() {
        Some(j) if j.has_income_tax() => DEFAULT_STATE_RATE,
        _ => Decimal::ZERO,
    }
}

fn default_rates(profile: &TaxProfile) -> ResolvedRates {
    ResolvedRates {
        federal: DEFAULT_FEDERAL_RATE,
        state: default_state_rate(profile),
        ltcg: DEFAULT_LTCG_RATE,
        source: RateSource::Default,
        table_year: None,
        data_missing: false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::brackets::fixtures::table_set_2025;
    use crate::models::FilingStatusCode;
    use crate::models::fixtures::{california_2026, config_2026};

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn profile() -> TaxProfile {
        TaxProfile {
            state: Some("CA".to_string()),
            annual_income: Some(dec!(150000)),
            ..TaxProfile::new(FilingStatusCode::Single)
        }
    }

    fn grant(
        category: GrantCategory,
        share_category: ShareCategory,
    ) -> GrantTerms {
        GrantTerms {
            id: 9,
            grant_date: date(2023, 1, 1),
            category,
            share_category,
            quantity: dec!(100),
            price_at_grant: dec!(10.00),
            vest_years: dec!(5),
            cliff_years: dec!(1),
            purchase_discount: dec!(0),
            bonus_type: None,
        }
    }

    fn with_orchestrator<T>(f: impl FnOnce(&TaxOrchestrator<'_>) -> T) -> T {
        let tables = table_set_2025();
        let configs = TaxYearConfigSet::new([config_2026()]);
        f(&TaxOrchestrator::new(&tables, &configs))
    }

    fn with_california_levies<T>(f: impl FnOnce(&TaxOrchestrator<'_>) -> T) -> T {
        let tables = table_set_2025();
        let configs = TaxYearConfigSet::new([config_2026()]);
        let states = StateLevySet::new([california_2026()]);
        f(&TaxOrchestrator::new(&tables, &configs).with_state_levies(&states))
    }

    fn manual(profile: TaxProfile) -> TaxProfile {
        TaxProfile {
            use_manual_rates: true,
            ..profile
        }
    }

    // =========================================================================
    // Rate resolution
    // =========================================================================

    #[test]
    fn resolve_rates_from_brackets() {
        let result = with_orchestrator(|o| o.resolve_rates(&profile(), 2025));

        assert_eq!(
            result,
            ResolvedRates {
                federal: dec!(0.24),
                state: dec!(0.093),
                ltcg: dec!(0.15),
                source: RateSource::Brackets,
                table_year: Some(2025),
                data_missing: false,
            }
        );
    }

    #[test]
    fn resolve_rates_falls_back_to_nearest_table_year() {
        let result = with_orchestrator(|o| o.resolve_rates(&profile(), 2027));

        assert_eq!(result.federal, dec!(0.24));
        assert_eq!(result.table_year, Some(2025));
    }

    #[test]
    fn manual_rates_override_brackets_with_defaults_for_blanks() {
        let manual = TaxProfile {
            use_manual_rates: true,
            manual_federal_rate: Some(dec!(0.30)),
            ..profile()
        };

        let result = with_orchestrator(|o| o.resolve_rates(&manual, 2025));

        assert_eq!(result.federal, dec!(0.30));
        assert_eq!(result.state, dec!(0.093));
        assert_eq!(result.ltcg, dec!(0.15));
        assert_eq!(result.source, RateSource::Manual);
    }

    #[test]
    fn profile_without_income_uses_defaults() {
        let no_income = TaxProfile {
            annual_income: None,
            ..profile()
        };

        let result = with_orchestrator(|o| o.resolve_rates(&no_income, 2025));

        assert_eq!(result.federal, dec!(0.22));
        assert_eq!(result.state, dec!(0.093));
        assert_eq!(result.source, RateSource::Default);
    }

    #[test]
    fn default_state_rate_is_zero_for_no_income_tax_state() {
        let texan = TaxProfile {
            state: Some("TX".to_string()),
            annual_income: None,
            ..profile()
        };

        let result = with_orchestrator(|o| o.resolve_rates(&texan, 2025));

        assert_eq!(result.state, dec!(0));
    }

    #[test]
    fn manual_blank_state_rate_is_zero_for_no_income_tax_state() {
        let texan = manual(TaxProfile {
            state: Some("TX".to_string()),
            manual_federal_rate: Some(dec!(0.32)),
            ..profile()
        });

        let result = with_orchestrator(|o| o.resolve_rates(&texan, 2025));

        assert_eq!(result.state, dec!(0));
        assert_eq!(result.federal, dec!(0.32));
        assert_eq!(result.source, RateSource::Manual);
    }

    #[test]
    fn manual_blank_state_rate_without_state_is_zero() {
        let stateless = manual(TaxProfile {
            state: None,
            ..profile()
        });

        let result = with_orchestrator(|o| o.resolve_rates(&stateless, 2025));

        assert_eq!(result.state, dec!(0));
    }

    #[test]
    fn surcharge_joins_state_marginal_rate_above_threshold() {
        let high_earner = TaxProfile {
            annual_income: Some(dec!(1200000)),
            ..profile()
        };

        let below = with_california_levies(|o| o.resolve_rates(&profile(), 2025));
        let above = with_california_levies(|o| o.resolve_rates(&high_earner, 2025));

        assert_eq!(below.state, dec!(0.093));
        assert_eq!(above.state, dec!(0.133));
    }

    #[test]
    fn surcharge_skips_other_states() {
        let new_yorker = TaxProfile {
            state: Some("NY".to_string()),
            annual_income: Some(dec!(1200000)),
            ..profile()
        };

        let result = with_california_levies(|o| o.resolve_rates(&new_yorker, 2025));

        assert_eq!(result.state, dec!(0));
    }

    #[test]
    fn effective_rates_include_surcharge() {
        let tables = table_set_2025();
        let base = EffectiveRates::from_known_income(&tables, &profile(), 2025, dec!(2000000));

        let result =
            with_california_levies(|o| o.effective_rates(&profile(), 2025, dec!(2000000)));

        // 10,000 of surcharge over 2,000,000 of income.
        assert_eq!(result.state, base.state + dec!(0.005));
        assert_eq!(result.federal, base.federal);
    }

    #[test]
    fn resolve_rates_for_income_does_not_touch_profile() {
        let original = profile();

        let result = with_orchestrator(|o| o.resolve_rates_for_income(&original, 2025, dec!(600000)));

        assert_eq!(result.federal, dec!(0.35));
        assert_eq!(result.ltcg, dec!(0.20));
        assert_eq!(original, profile());
    }

    #[test]
    fn missing_state_table_is_flagged() {
        let new_yorker = TaxProfile {
            state: Some("NY".to_string()),
            ..profile()
        };

        let result = with_orchestrator(|o| o.resolve_rates(&new_yorker, 2025));

        assert_eq!(result.state, dec!(0));
        assert!(result.data_missing);
    }

    #[test]
    fn effective_rates_from_known_income() {
        let tables = table_set_2025();

        let result = EffectiveRates::from_known_income(&tables, &profile(), 2025, dec!(10000));

        assert_eq!(result, EffectiveRates::new(dec!(0.1), dec!(0.01)));
    }

    #[test]
    fn effective_rates_zero_income() {
        let tables = table_set_2025();

        let result = EffectiveRates::from_known_income(&tables, &profile(), 2025, dec!(0));

        assert_eq!(result, EffectiveRates::new(dec!(0), dec!(0)));
    }

    // =========================================================================
    // breakdown tests
    // =========================================================================

    #[test]
    fn marginal_breakdown_with_fica() {
        let result = with_orchestrator(|o| {
            o.breakdown(dec!(10000), 2025, &profile(), &RateMode::MarginalProgressive)
        });

        assert_eq!(result.federal_tax, dec!(2400.00));
        assert_eq!(result.state_tax, dec!(930.00));
        assert_eq!(result.social_security, dec!(620.00));
        assert_eq!(result.medicare, dec!(145.00));
        assert_eq!(result.additional_medicare, dec!(0));
        assert_eq!(result.total_fica, dec!(765.00));
        assert_eq!(result.total_tax, dec!(4095.00));
        assert_eq!(result.net_amount, dec!(5905.00));
        assert_eq!(result.effective_rate, dec!(0.4095));
        assert_eq!(result.rate_source, RateSource::Brackets);
        assert!(!result.data_missing);
    }

    #[test]
    fn breakdown_without_fica() {
        let no_fica = TaxProfile {
            include_fica: false,
            ..profile()
        };

        let result = with_orchestrator(|o| {
            o.breakdown(dec!(10000), 2025, &no_fica, &RateMode::MarginalProgressive)
        });

        assert_eq!(result.total_fica, dec!(0));
        assert_eq!(result.total_tax, dec!(3330.00));
    }

    #[test]
    fn effective_mode_uses_supplied_rates() {
        let mode = RateMode::Effective(EffectiveRates::new(dec!(0.18), dec!(0.06)));

        let result = with_orchestrator(|o| o.breakdown(dec!(10000), 2024, &profile(), &mode));

        assert_eq!(result.federal_tax, dec!(1800.00));
        assert_eq!(result.state_tax, dec!(600.00));
        assert_eq!(result.rate_source, RateSource::Effective);
    }

    #[test]
    fn zero_gross_has_zero_effective_rate() {
        let result = with_orchestrator(|o| {
            o.breakdown(dec!(0), 2025, &profile(), &RateMode::MarginalProgressive)
        });

        assert_eq!(result.total_tax, dec!(0));
        assert_eq!(result.effective_rate, dec!(0));
    }

    #[test]
    fn california_breakdown_withholds_sdi() {
        let result = with_california_levies(|o| {
            o.breakdown(dec!(10000), 2025, &profile(), &RateMode::MarginalProgressive)
        });

        assert_eq!(result.state_sdi, dec!(90.00));
        assert_eq!(result.total_fica, dec!(765.00));
        assert_eq!(result.total_tax, dec!(4185.00));
        assert_eq!(result.net_amount, dec!(5815.00));
    }

    #[test]
    fn sdi_respects_ytd_wages_against_wage_limit() {
        let near_limit = TaxProfile {
            ytd_wages: dec!(150000),
            ..profile()
        };

        let result = with_california_levies(|o| {
            o.breakdown(dec!(10000), 2025, &near_limit, &RateMode::MarginalProgressive)
        });

        assert_eq!(result.state_sdi, dec!(28.48));
    }

    #[test]
    fn sdi_skipped_without_payroll_taxes() {
        let no_fica = TaxProfile {
            include_fica: false,
            ..profile()
        };

        let result = with_california_levies(|o| {
            o.breakdown(dec!(10000), 2025, &no_fica, &RateMode::MarginalProgressive)
        });

        assert_eq!(result.state_sdi, dec!(0));
        assert_eq!(result.total_tax, dec!(3330.00));
    }

    #[test]
    fn breakdown_without_levies_has_no_sdi() {
        let result = with_orchestrator(|o| {
            o.breakdown(dec!(10000), 2025, &profile(), &RateMode::MarginalProgressive)
        });

        assert_eq!(result.state_sdi, dec!(0));
    }

    #[test]
    fn missing_fica_config_is_flagged() {
        let tables = table_set_2025();
        let configs = TaxYearConfigSet::default();
        let orchestrator = TaxOrchestrator::new(&tables, &configs);

        let result =
            orchestrator.breakdown(dec!(10000), 2025, &profile(), &RateMode::MarginalProgressive);

        assert!(result.data_missing);
        assert_eq!(result.total_fica, dec!(0));
    }

    // =========================================================================
    // Vest valuation
    // =========================================================================

    #[test]
    fn restricted_vest_is_shares_times_price() {
        let terms = grant(GrantCategory::NewHire, ShareCategory::Restricted);
        let event = VestEvent::new(9, date(2025, 6, 15), dec!(120), false);

        let result = with_orchestrator(|o| o.value_vest_event(&terms, &event, dec!(55.50)));

        assert_eq!(result.wage_income, dec!(6660.00));
        assert_eq!(result.amt_preference, dec!(0));
    }

    #[test]
    fn cash_vest_is_dollar_amount() {
        let terms = grant(GrantCategory::Bonus, ShareCategory::Cash);
        let event = VestEvent::new(9, date(2025, 6, 15), dec!(500), true);

        let result = with_orchestrator(|o| o.value_vest_event(&terms, &event, dec!(55.50)));

        assert_eq!(result.wage_income, dec!(500));
    }

    #[test]
    fn option_vest_is_amt_preference_only() {
        let terms = grant(GrantCategory::NewHire, ShareCategory::Iso5Year);
        let event = VestEvent::new(9, date(2025, 6, 1), dec!(100), false);

        let result = with_orchestrator(|o| {
            o.breakdown_for_vest(&terms, &event, dec!(60.00), &profile(), &RateMode::MarginalProgressive)
        });

        assert_eq!(result.gross_value, dec!(0));
        assert_eq!(result.total_tax, dec!(0));
        assert_eq!(result.amt_preference, dec!(5000.00));
        assert_eq!(result.tax_year, 2025);
    }

    #[test]
    fn purchase_plan_vest_is_discount_gain() {
        let terms = GrantTerms {
            purchase_discount: dec!(0.15),
            price_at_grant: dec!(50.00),
            ..grant(GrantCategory::PurchasePlan, ShareCategory::Restricted)
        };
        let event = VestEvent::new(9, date(2023, 1, 1), dec!(100), true);

        let result = with_orchestrator(|o| o.value_vest_event(&terms, &event, dec!(70.00)));

        assert_eq!(result.wage_income, dec!(750.00));
    }

    #[test]
    fn restricted_vest_breakdown() {
        let terms = grant(GrantCategory::NewHire, ShareCategory::Restricted);
        let event = VestEvent::new(9, date(2025, 6, 15), dec!(100), false);

        let result = with_orchestrator(|o| {
            o.breakdown_for_vest(&terms, &event, dec!(100.00), &profile(), &RateMode::MarginalProgressive)
        });

        assert_eq!(result.gross_value, dec!(10000.00));
        assert_eq!(result.total_tax, dec!(4095.00));
    }

    // =========================================================================
    // Capital gains through the orchestrator
    // =========================================================================

    #[test]
    fn capital_gains_uses_profile_state_rate() {
        let result = with_orchestrator(|o| {
            o.capital_gains(dec!(10000), date(2024, 1, 1), date(2025, 3, 1), dec!(150000), &profile())
        });

        assert_eq!(result.federal_tax, dec!(1500.00));
        assert_eq!(result.state_rate, dec!(0.093));
        assert_eq!(result.state_tax, dec!(930.00));
    }

    #[test]
    fn capital_gains_uses_manual_ltcg_rate() {
        let manual_profile = TaxProfile {
            manual_ltcg_rate: Some(dec!(0.10)),
            manual_state_rate: Some(dec!(0.05)),
            ..manual(profile())
        };

        let result = with_orchestrator(|o| {
            o.capital_gains(
                dec!(10000),
                date(2024, 1, 1),
                date(2025, 3, 1),
                dec!(150000),
                &manual_profile,
            )
        });

        assert_eq!(result.federal_rate, dec!(0.10));
        assert_eq!(result.federal_tax, dec!(1000.00));
        assert_eq!(result.state_tax, dec!(500.00));
    }

    #[test]
    fn capital_gains_short_term_uses_manual_federal_rate() {
        let manual_profile = TaxProfile {
            manual_federal_rate: Some(dec!(0.32)),
            ..manual(profile())
        };

        let result = with_orchestrator(|o| {
            o.capital_gains(
                dec!(10000),
                date(2025, 1, 1),
                date(2025, 6, 1),
                dec!(150000),
                &manual_profile,
            )
        });

        assert_eq!(result.federal_rate, dec!(0.32));
        assert_eq!(result.federal_tax, dec!(3200.00));
    }

    #[test]
    fn capital_gains_state_rate_includes_surcharge() {
        let result = with_california_levies(|o| {
            o.capital_gains(dec!(10000), date(2024, 1, 1), date(2025, 3, 1), dec!(1500000), &profile())
        });

        assert_eq!(result.state_rate, dec!(0.133));
        assert_eq!(result.state_tax, dec!(1330.00));
    }
}

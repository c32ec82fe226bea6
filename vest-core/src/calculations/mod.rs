//! Tax calculation modules for equity compensation.
//!
//! Each module covers one concern: turning grant terms into vest events,
//! looking up bracket rates, payroll taxes, state levies, the alternative
//! minimum tax and capital gains on sale. [`orchestrator`] combines them
//! into a per-event tax breakdown.

pub mod amt;
pub mod apportion;
pub mod brackets;
pub mod capital_gains;
pub mod common;
pub mod fica;
pub mod orchestrator;
pub mod state_levies;
pub mod vesting;

pub use amt::{
    AmtCalculator, AmtConfig, AmtError, AmtResult, AmtSeverity, IsoExerciseProjection,
    amt_credit_recovery, compute_amt,
};
pub use apportion::apportion;
pub use brackets::{
    BracketEngine, BracketTableSet, ProgressiveTax, RateLookup, compute_progressive_tax,
    effective_rate, marginal_rate_in, resolve_bracket_rate,
};
pub use capital_gains::{
    CapitalGainsCalculator, CapitalGainsResult, FederalGainRates, HoldingPeriod,
    LONG_TERM_HOLDING_DAYS, classify_holding_period, compute_capital_gains_tax, holding_days,
    is_qualifying_disposition, sale_gain,
};
pub use fica::{FicaCalculator, FicaConfig, FicaError, FicaResult, compute_fica};
pub use orchestrator::{
    DEFAULT_FEDERAL_RATE, DEFAULT_LTCG_RATE, DEFAULT_STATE_RATE, EffectiveRates, RateMode,
    RateSource, ResolvedRates, TaxBreakdown, TaxOrchestrator, VestValuation,
};
pub use state_levies::{SdiResult, compute_sdi, surcharge_rate_at, surcharge_tax};
pub use vesting::{
    AnchorError, ScheduleSummary, VestAnchors, VestScheduleGenerator, generate_vest_schedule,
    schedule_summary,
};

//! Vest schedule generation.
//!
//! Turns [`GrantTerms`] into the dated list of [`VestEvent`]s for the grant.
//! Every schedule sums to the grant quantity exactly, dates never decrease,
//! and the first event is the cliff.
//!
//! | Share category        | Schedule |
//! |-----------------------|----------|
//! | Purchase plans        | One event on the grant date |
//! | Restricted stock/cash | Semiannual anchor dates; the cliff absorbs the periods elapsed before it |
//! | Incentive options     | 48 monthly periods from the vesting start; the cliff at month 6 absorbs 6/48 |
//!
//! Option schedules depend only on the share category, whatever the grant
//! category. Restricted and cash grants too short to yield a single
//! semiannual period fall back to a one-year vest with a one-year cliff on
//! the anchors.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use vest_core::calculations::generate_vest_schedule;
//! use vest_core::{GrantCategory, GrantTerms, ShareCategory};
//!
//! let grant = GrantTerms {
//!     id: 1,
//!     grant_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
//!     category: GrantCategory::NewHire,
//!     share_category: ShareCategory::Restricted,
//!     quantity: dec!(1200),
//!     price_at_grant: dec!(40.00),
//!     vest_years: dec!(5),
//!     cliff_years: dec!(1),
//!     purchase_discount: dec!(0),
//!     bonus_type: None,
//! };
//!
//! let events = generate_vest_schedule(&grant);
//!
//! assert_eq!(events.len(), 9);
//! assert_eq!(events[0].shares_vested, dec!(240));
//! assert_eq!(events[0].vest_date, NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
//! ```

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calculations::apportion::apportion;
use crate::models::{GrantTerms, ShareCategory, VestEvent};

/// Length of an option vesting schedule.
const OPTION_SCHEDULE_MONTHS: u32 = 48;

/// Months between option vesting start and the option cliff.
const OPTION_CLIFF_MONTHS: u32 = 6;

/// Months per semiannual anchor period.
const ANCHOR_PERIOD_MONTHS: u32 = 6;

/// Errors raised when constructing [`VestAnchors`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnchorError {
    #[error("anchor {month}/{day} is not a calendar day in every year")]
    InvalidDay { month: u32, day: u32 },

    #[error("first anchor {first_month}/{first_day} must fall before second anchor {second_month}/{second_day}")]
    OutOfOrder {
        first_month: u32,
        first_day: u32,
        second_month: u32,
        second_day: u32,
    },
}

/// The two calendar dates per year on which restricted and cash grants vest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestAnchors {
    first: (u32, u32),
    second: (u32, u32),
}

impl Default for VestAnchors {
    /// June 15 and November 15.
    fn default() -> Self {
        Self {
            first: (6, 15),
            second: (11, 15),
        }
    }
}

impl VestAnchors {
    /// # Errors
    ///
    /// Returns [`AnchorError`] if either anchor is not a day that exists in
    /// every year (Feb 29 included) or the first anchor is not before the second.
    pub fn new(
        first: (u32, u32),
        second: (u32, u32),
    ) -> Result<Self, AnchorError> {
        for (month, day) in [first, second] {
            // 2023 is not a leap year.
            if NaiveDate::from_ymd_opt(2023, month, day).is_none() {
                return Err(AnchorError::InvalidDay { month, day });
            }
        }
        if first >= second {
            return Err(AnchorError::OutOfOrder {
                first_month: first.0,
                first_day: first.1,
                second_month: second.0,
                second_day: second.1,
            });
        }
        Ok(Self { first, second })
    }

    /// Both anchors in `year`, in calendar order.
    fn in_year(
        &self,
        year: i32,
    ) -> Option<[NaiveDate; 2]> {
        Some([
            NaiveDate::from_ymd_opt(year, self.first.0, self.first.1)?,
            NaiveDate::from_ymd_opt(year, self.second.0, self.second.1)?,
        ])
    }

    /// The anchor closest to `target`; equal distance resolves to the later anchor.
    fn nearest(
        &self,
        target: NaiveDate,
    ) -> Option<NaiveDate> {
        let year = target.year();
        let mut best: Option<NaiveDate> = None;
        for y in [year - 1, year, year + 1] {
            for anchor in self.in_year(y)? {
                let distance = (anchor - target).num_days().abs();
                best = match best {
                    Some(b) if (b - target).num_days().abs() < distance => Some(b),
                    _ => Some(anchor),
                };
            }
        }
        best
    }

    fn first_on_or_after(
        &self,
        date: NaiveDate,
    ) -> Option<NaiveDate> {
        let year = date.year();
        [year, year + 1]
            .into_iter()
            .map(|y| self.in_year(y))
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .flatten()
            .find(|&anchor| anchor >= date)
    }

    fn next_after(
        &self,
        date: NaiveDate,
    ) -> Option<NaiveDate> {
        self.first_on_or_after(date.succ_opt()?)
    }
}

/// Generates vest schedules against a fixed pair of anchor dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct VestScheduleGenerator {
    anchors: VestAnchors,
}

impl VestScheduleGenerator {
    pub fn new(anchors: VestAnchors) -> Self {
        Self { anchors }
    }

    /// Produces the ordered vest events for `grant`.
    ///
    /// Never fails: restricted and cash grants shorter than one semiannual
    /// period use the fallback schedule, and dates outside the supported calendar range collapse the schedule into
    /// a single event on the grant date.
    pub fn generate(
        &self,
        grant: &GrantTerms,
    ) -> Vec<VestEvent> {
        if grant.category.is_purchase_plan() {
            return vec![VestEvent::new(grant.id, grant.grant_date, grant.quantity, true)];
        }

        let schedule = match grant.share_category {
            ShareCategory::Iso5Year => self.option_schedule(grant, 1),
            ShareCategory::Iso6Year => self.option_schedule(grant, 2),
            ShareCategory::Restricted | ShareCategory::Cash => {
                match periods(grant.vest_years, 2) {
                    0 => self.fallback_schedule(grant),
                    total => self.anchor_schedule(grant, months(grant.cliff_years), total),
                }
            }
        };

        schedule.unwrap_or_else(|| {
            debug!(
                grant_id = grant.id,
                grant_date = %grant.grant_date,
                "vest schedule dates out of range; vesting everything on the grant date"
            );
            vec![VestEvent::new(grant.id, grant.grant_date, grant.quantity, true)]
        })
    }

    fn fallback_schedule(
        &self,
        grant: &GrantTerms,
    ) -> Option<Vec<VestEvent>> {
        debug!(
            grant_id = grant.id,
            category = grant.category.as_str(),
            share_category = grant.share_category.as_str(),
            "vest term shorter than one period; using one-year semiannual fallback"
        );
        self.anchor_schedule(grant, 12, 2)
    }

    /// Semiannual schedule with `total_periods` periods and a cliff
    /// `cliff_months` after the grant date.
    fn anchor_schedule(
        &self,
        grant: &GrantTerms,
        cliff_months: u32,
        total_periods: u32,
    ) -> Option<Vec<VestEvent>> {
        let target = grant.grant_date.checked_add_months(Months::new(cliff_months))?;
        let mut cliff = self.anchors.nearest(target)?;
        if cliff < grant.grant_date {
            cliff = self.anchors.first_on_or_after(grant.grant_date)?;
        }

        let elapsed = (cliff_months / ANCHOR_PERIOD_MONTHS).clamp(1, total_periods);
        let mut weights = vec![elapsed];
        weights.resize((total_periods - elapsed + 1) as usize, 1);

        let mut dates = Vec::with_capacity(weights.len());
        let mut date = cliff;
        dates.push(date);
        for _ in 1..weights.len() {
            date = self.anchors.next_after(date)?;
            dates.push(date);
        }

        Some(build_events(grant, &dates, &weights))
    }

    /// Monthly option schedule starting `offset_years` after the grant.
    fn option_schedule(
        &self,
        grant: &GrantTerms,
        offset_years: u32,
    ) -> Option<Vec<VestEvent>> {
        let start = grant
            .grant_date
            .checked_add_months(Months::new(12 * offset_years))?
            .with_day(1)?;
        let cliff = start.checked_add_months(Months::new(OPTION_CLIFF_MONTHS))?;

        let monthly = OPTION_SCHEDULE_MONTHS - OPTION_CLIFF_MONTHS;
        let mut weights = vec![OPTION_CLIFF_MONTHS];
        weights.resize(monthly as usize + 1, 1);

        let dates = (0..=monthly)
            .map(|k| cliff.checked_add_months(Months::new(k)))
            .collect::<Option<Vec<_>>>()?;

        Some(build_events(grant, &dates, &weights))
    }
}

/// Generates the schedule for `grant` using the default June/November anchors.
pub fn generate_vest_schedule(grant: &GrantTerms) -> Vec<VestEvent> {
    VestScheduleGenerator::default().generate(grant)
}

fn build_events(
    grant: &GrantTerms,
    dates: &[NaiveDate],
    weights: &[u32],
) -> Vec<VestEvent> {
    apportion(grant.quantity, weights)
        .into_iter()
        .zip(dates)
        .enumerate()
        .map(|(i, (shares, &date))| VestEvent::new(grant.id, date, shares, i == 0))
        .collect()
}

/// Whole months in `years`, floored. Negative values count as zero.
fn months(years: Decimal) -> u32 {
    periods(years, 12)
}

fn periods(
    years: Decimal,
    per_year: u32,
) -> u32 {
    (years * Decimal::from(per_year))
        .floor()
        .to_u32()
        .unwrap_or(0)
}

/// Vested and unvested totals of a schedule at a reference date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub vested: Decimal,
    pub unvested: Decimal,
    pub next_vest_date: Option<NaiveDate>,
}

/// Splits `events` into vested and unvested quantities as of `as_of` (inclusive).
pub fn schedule_summary(
    events: &[VestEvent],
    as_of: NaiveDate,
) -> ScheduleSummary {
    let (vested, unvested): (Vec<&VestEvent>, Vec<&VestEvent>) =
        events.iter().partition(|e| e.has_vested(as_of));

    ScheduleSummary {
        vested: vested.iter().map(|e| e.shares_vested).sum(),
        unvested: unvested.iter().map(|e| e.shares_vested).sum(),
        next_vest_date: unvested.iter().map(|e| e.vest_date).min(),
    }
}

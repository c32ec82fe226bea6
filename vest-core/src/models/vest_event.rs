use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{max, ratio_or_zero, round_half_up};
use crate::models::{GrantTerms, ShareCategory};

/// How the tax due at vest was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TaxPayment {
    /// Shares sold at vest to cover the tax.
    SellToCover { shares_sold: Decimal },
    /// Cash paid in, counted as the equivalent shares at the vest price.
    CashToCover { cash: Decimal },
}

impl Default for TaxPayment {
    fn default() -> Self {
        Self::SellToCover {
            shares_sold: Decimal::ZERO,
        }
    }
}

/// What the holder keeps after taxes are covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestSettlement {
    pub shares_withheld: Decimal,
    pub shares_received: Decimal,
    /// Shares received times the per-share value at vest, in USD.
    pub net_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestEvent {
    pub grant_id: i64,
    pub vest_date: NaiveDate,
    /// Whole shares, or whole USD for cash grants.
    pub shares_vested: Decimal,
    pub tax_year: i32,
    pub is_cliff: bool,
}

impl VestEvent {
    pub fn new(
        grant_id: i64,
        vest_date: NaiveDate,
        shares_vested: Decimal,
        is_cliff: bool,
    ) -> Self {
        Self {
            grant_id,
            vest_date,
            shares_vested,
            tax_year: vest_date.year(),
            is_cliff,
        }
    }

    /// Whether the event has vested as of `as_of` (inclusive).
    pub fn has_vested(&self, as_of: NaiveDate) -> bool {
        self.vest_date <= as_of
    }

    /// Splits the event into shares withheld for taxes and shares received.
    ///
    /// Each share is worth the vest price, or the spread over the strike for
    /// options. Cash grants count one unit per USD. Withheld shares never
    /// exceed the event and a missing price leaves nothing withheld for
    /// cash-to-cover.
    pub fn settle(
        &self,
        grant: &GrantTerms,
        price_at_vest: Decimal,
        payment: TaxPayment,
    ) -> VestSettlement {
        let unit_price = match grant.share_category {
            ShareCategory::Cash => Decimal::ONE,
            _ => price_at_vest,
        };
        let unit_value = match grant.share_category {
            ShareCategory::Iso5Year | ShareCategory::Iso6Year => {
                max(unit_price - grant.price_at_grant, Decimal::ZERO)
            }
            _ => unit_price,
        };

        let withheld = match payment {
            TaxPayment::SellToCover { shares_sold } => shares_sold,
            TaxPayment::CashToCover { cash } => ratio_or_zero(cash, unit_price),
        };
        let shares_withheld = withheld.clamp(Decimal::ZERO, self.shares_vested);
        let shares_received = self.shares_vested - shares_withheld;

        VestSettlement {
            shares_withheld,
            shares_received,
            net_value: round_half_up(shares_received * unit_value),
        }
    }
}

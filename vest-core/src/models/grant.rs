use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantCategory {
    NewHire,
    Promotion,
    AnnualPerformance,
    Bonus,
    PurchasePlan,
    NonQualifiedPurchasePlan,
}

impl GrantCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewHire => "new_hire",
            Self::Promotion => "promotion",
            Self::AnnualPerformance => "annual_performance",
            Self::Bonus => "bonus",
            Self::PurchasePlan => "purchase_plan",
            Self::NonQualifiedPurchasePlan => "nq_purchase_plan",
        }
    }

    /// Parses a category code. `kickass`, `espp` and `nqespp` are accepted as
    /// aliases for the bonus and purchase-plan categories.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_hire" => Some(Self::NewHire),
            "promotion" => Some(Self::Promotion),
            "annual_performance" => Some(Self::AnnualPerformance),
            "bonus" | "kickass" => Some(Self::Bonus),
            "purchase_plan" | "espp" => Some(Self::PurchasePlan),
            "nq_purchase_plan" | "nqespp" => Some(Self::NonQualifiedPurchasePlan),
            _ => None,
        }
    }

    pub fn is_purchase_plan(&self) -> bool {
        matches!(self, Self::PurchasePlan | Self::NonQualifiedPurchasePlan)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareCategory {
    Restricted,
    /// Incentive option whose vesting starts one year after grant.
    Iso5Year,
    /// Incentive option whose vesting starts two years after grant.
    Iso6Year,
    /// Cash bonus; quantities are USD amounts rather than share counts.
    Cash,
}

impl ShareCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Iso5Year => "iso_5y",
            Self::Iso6Year => "iso_6y",
            Self::Cash => "cash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "restricted" | "rsu" => Some(Self::Restricted),
            "iso_5y" => Some(Self::Iso5Year),
            "iso_6y" => Some(Self::Iso6Year),
            "cash" => Some(Self::Cash),
            _ => None,
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Self::Iso5Year | Self::Iso6Year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusType {
    ShortTerm,
    LongTerm,
}

impl BonusType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "short_term" => Some(Self::ShortTerm),
            "long_term" => Some(Self::LongTerm),
            _ => None,
        }
    }
}

/// Terms of one equity grant as entered by the user.
///
/// Editing any field means regenerating the whole vest schedule; the terms
/// themselves are never patched by the computation core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantTerms {
    pub id: i64,
    pub grant_date: NaiveDate,
    pub category: GrantCategory,
    pub share_category: ShareCategory,
    /// Share count, or a USD amount for cash grants.
    pub quantity: Decimal,
    /// Market price at grant; the strike price for options.
    pub price_at_grant: Decimal,
    pub vest_years: Decimal,
    pub cliff_years: Decimal,
    /// Purchase-plan discount as a fraction (0.15 = 15%). Zero for other grants.
    pub purchase_discount: Decimal,
    pub bonus_type: Option<BonusType>,
}

impl GrantTerms {
    pub fn is_option(&self) -> bool {
        self.share_category.is_option()
    }

    pub fn is_cash(&self) -> bool {
        self.share_category == ShareCategory::Cash
    }

    /// What was actually paid per share.
    ///
    /// Purchase-plan shares cost the discounted price, non-qualified plan
    /// shares and options cost the full grant (strike) price, and restricted
    /// stock and cash are granted outright.
    pub fn cost_basis_per_share(&self) -> Decimal {
        if self.category == GrantCategory::PurchasePlan && !self.purchase_discount.is_zero() {
            return self.price_at_grant * (Decimal::ONE - self.purchase_discount);
        }
        if self.category == GrantCategory::NonQualifiedPurchasePlan || self.is_option() {
            return self.price_at_grant;
        }
        Decimal::ZERO
    }

    /// Immediate gain from the purchase-plan discount (quantity × price × discount).
    pub fn purchase_discount_gain(&self) -> Decimal {
        if self.category == GrantCategory::PurchasePlan {
            self.quantity * self.price_at_grant * self.purchase_discount
        } else {
            Decimal::ZERO
        }
    }
}

/// Default `(vest_years, cliff_years)` for a grant when the user leaves them blank.
pub fn default_vest_terms(
    category: GrantCategory,
    share_category: ShareCategory,
    bonus_type: Option<BonusType>,
) -> (Decimal, Decimal) {
    let one = Decimal::ONE;
    let one_and_half = Decimal::new(15, 1);

    match (category, bonus_type, share_category) {
        (GrantCategory::NewHire | GrantCategory::Promotion, _, _) => (Decimal::from(5), one),
        (GrantCategory::AnnualPerformance, Some(BonusType::LongTerm), ShareCategory::Restricted) => {
            (one, one_and_half)
        }
        (GrantCategory::AnnualPerformance, Some(BonusType::LongTerm), ShareCategory::Iso5Year) => {
            (Decimal::from(5), one_and_half)
        }
        (GrantCategory::AnnualPerformance, Some(BonusType::LongTerm), ShareCategory::Iso6Year) => {
            (Decimal::from(6), Decimal::new(25, 1))
        }
        (GrantCategory::PurchasePlan | GrantCategory::NonQualifiedPurchasePlan, _, _) => {
            (Decimal::ZERO, Decimal::ZERO)
        }
        _ => (one, one),
    }
}

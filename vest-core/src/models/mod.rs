mod filing_status;
mod grant;
mod state_levy;
mod tax_bracket;
mod tax_profile;
mod tax_year_config;
mod vest_event;

pub use filing_status::{ByFilingStatus, FilingStatusCode};
pub use grant::{BonusType, GrantCategory, GrantTerms, ShareCategory, default_vest_terms};
pub use state_levy::{StateLevyConfig, StateLevySet};
pub use tax_bracket::{
    BracketTableError, Jurisdiction, TableKey, TaxBracket, TaxBracketTable, TaxType,
};
pub use tax_profile::TaxProfile;
pub use tax_year_config::{ConfigError, StatusThresholds, TaxYearConfig, TaxYearConfigSet};
pub use vest_event::{TaxPayment, VestEvent, VestSettlement};

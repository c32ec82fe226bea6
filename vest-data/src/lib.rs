pub mod config_loader;
pub mod grants;
pub mod loader;
pub mod source;

pub use config_loader::{
    ConfigLoaderError, StateLevyLoader, StateLevyRecord, TaxYearConfigLoader, ThresholdRecord,
    YearRecord,
};
pub use grants::{GrantLoader, GrantLoaderError, GrantRecord};
pub use loader::{BracketLoaderError, BracketRecord, BracketTableLoader};
pub use source::{CsvReferenceSource, CsvSourceFactory};

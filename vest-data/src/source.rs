use std::collections::BTreeMap;
use std::io::{ErrorKind, Read};
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};
use vest_core::reference::SourceFactory;
use vest_core::{
    Jurisdiction, ReferenceError, ReferenceSource, StateLevyConfig, TableKey, TaxBracketTable,
    TaxYearConfig,
};

use crate::config_loader::{StateLevyLoader, TaxYearConfigLoader};
use crate::loader::BracketTableLoader;

pub const BRACKETS_FILE: &str = "brackets.csv";
pub const TAX_YEAR_CONFIG_FILE: &str = "tax_year_config.csv";
pub const FILING_THRESHOLDS_FILE: &str = "filing_thresholds.csv";
pub const STATE_LEVIES_FILE: &str = "state_levies.csv";

/// Reference data read from a directory of CSV files.
///
/// The directory must hold [`BRACKETS_FILE`], [`TAX_YEAR_CONFIG_FILE`] and
/// [`FILING_THRESHOLDS_FILE`]; [`STATE_LEVIES_FILE`] is optional. Everything
/// is parsed and validated when the source is opened.
#[derive(Debug, Clone, Default)]
pub struct CsvReferenceSource {
    tables: BTreeMap<TableKey, TaxBracketTable>,
    configs: BTreeMap<i32, TaxYearConfig>,
    levies: BTreeMap<(Jurisdiction, i32), StateLevyConfig>,
}

impl CsvReferenceSource {
    pub async fn open(dir: &Path) -> Result<Self, ReferenceError> {
        let brackets = read_required(&dir.join(BRACKETS_FILE)).await?;
        let years = read_required(&dir.join(TAX_YEAR_CONFIG_FILE)).await?;
        let thresholds = read_required(&dir.join(FILING_THRESHOLDS_FILE)).await?;

        let mut source =
            Self::from_readers(brackets.as_slice(), years.as_slice(), thresholds.as_slice())?;
        match read_file(&dir.join(STATE_LEVIES_FILE)).await {
            Ok(levies) => source = source.with_state_levies(levies.as_slice())?,
            Err(ReferenceError::NotFound) => debug!(dir = %dir.display(), "no state levies"),
            Err(e) => return Err(e),
        }
        info!(
            dir = %dir.display(),
            tables = source.tables.len(),
            years = source.configs.len(),
            state_levies = source.levies.len(),
            "opened CSV reference data"
        );
        Ok(source)
    }

    /// Adds the state levies in `levies`, replacing any already loaded.
    pub fn with_state_levies<L: Read>(
        mut self,
        levies: L,
    ) -> Result<Self, ReferenceError> {
        let records = StateLevyLoader::parse(levies).map_err(invalid_data)?;
        self.levies = StateLevyLoader::build(&records)
            .map_err(invalid_data)?
            .into_iter()
            .map(|l| ((l.jurisdiction.clone(), l.tax_year), l))
            .collect();
        Ok(self)
    }

    pub fn from_readers<B: Read, Y: Read, T: Read>(
        brackets: B,
        years: Y,
        thresholds: T,
    ) -> Result<Self, ReferenceError> {
        let records = BracketTableLoader::parse(brackets).map_err(invalid_data)?;
        let tables = BracketTableLoader::build(&records).map_err(invalid_data)?;

        let years = TaxYearConfigLoader::parse_years(years).map_err(invalid_data)?;
        let thresholds = TaxYearConfigLoader::parse_thresholds(thresholds).map_err(invalid_data)?;
        let configs = TaxYearConfigLoader::build(&years, &thresholds).map_err(invalid_data)?;

        Ok(Self {
            tables: tables.into_iter().map(|t| (t.key().clone(), t)).collect(),
            configs: configs.into_iter().map(|c| (c.tax_year, c)).collect(),
            levies: BTreeMap::new(),
        })
    }
}

fn invalid_data(err: impl std::fmt::Display) -> ReferenceError {
    ReferenceError::InvalidData(err.to_string())
}

/// Reads `path`; a missing file is [`ReferenceError::NotFound`].
async fn read_file(path: &Path) -> Result<Vec<u8>, ReferenceError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ReferenceError::NotFound,
        _ => ReferenceError::Source(format!("{}: {e}", path.display())),
    })
}

async fn read_required(path: &Path) -> Result<Vec<u8>, ReferenceError> {
    read_file(path).await.map_err(|e| match e {
        ReferenceError::NotFound => ReferenceError::Source(format!("{} not found", path.display())),
        other => other,
    })
}

#[async_trait]
impl ReferenceSource for CsvReferenceSource {
    async fn list_tax_years(&self) -> Result<Vec<i32>, ReferenceError> {
        Ok(self.configs.keys().copied().collect())
    }

    async fn get_tax_year_config(&self, year: i32) -> Result<TaxYearConfig, ReferenceError> {
        self.configs.get(&year).cloned().ok_or(ReferenceError::NotFound)
    }

    async fn list_table_keys(&self) -> Result<Vec<TableKey>, ReferenceError> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn get_bracket_table(&self, key: &TableKey) -> Result<TaxBracketTable, ReferenceError> {
        self.tables.get(key).cloned().ok_or(ReferenceError::NotFound)
    }

    async fn list_state_levies(&self) -> Result<Vec<StateLevyConfig>, ReferenceError> {
        Ok(self.levies.values().cloned().collect())
    }
}

/// Opens the `csv` backend; the location is the data directory.
pub struct CsvSourceFactory;

#[async_trait]
impl SourceFactory for CsvSourceFactory {
    fn backend(&self) -> &'static str {
        "csv"
    }

    async fn open(
        &self,
        location: &str,
    ) -> Result<Box<dyn ReferenceSource>, ReferenceError> {
        Ok(Box::new(CsvReferenceSource::open(Path::new(location)).await?))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use vest_core::reference::SourceRegistry;
    use vest_core::{FilingStatusCode, TaxType};

    use super::*;

    const BRACKETS: &str = "jurisdiction,tax_year,filing_status,tax_type,min_income,max_income,rate
federal,2025,*,ordinary,0,10000,0.10
federal,2025,*,ordinary,10000,,0.20
";

    const YEARS: &str = "tax_year,ss_wage_base,ss_tax_rate,medicare_tax_rate,additional_medicare_rate,niit_rate,amt_lower_rate,amt_upper_rate,amt_rate_break,amt_phaseout_rate
2025,176100,0.062,0.0145,0.009,0.038,0.26,0.28,239100,0.25
";

    const THRESHOLDS: &str = "tax_year,filing_status,additional_medicare_threshold,niit_threshold,amt_exemption,amt_phaseout_threshold
2025,S,200000,200000,88100,626350
2025,MFJ,250000,250000,137000,1252700
2025,MFS,125000,125000,68500,626350
2025,HOH,200000,200000,88100,626350
2025,QSS,250000,250000,137000,1252700
";

    fn source() -> CsvReferenceSource {
        CsvReferenceSource::from_readers(
            BRACKETS.as_bytes(),
            YEARS.as_bytes(),
            THRESHOLDS.as_bytes(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lists_years_and_tables() {
        let source = source();

        assert_eq!(source.list_tax_years().await.unwrap(), vec![2025]);
        assert_eq!(source.list_table_keys().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_get_bracket_table_by_key() {
        let key = TableKey {
            jurisdiction: Jurisdiction::Federal,
            tax_year: 2025,
            filing_status: FilingStatusCode::HeadOfHousehold,
            tax_type: TaxType::Ordinary,
        };

        let table = source().get_bracket_table(&key).await.unwrap();

        assert_eq!(table.brackets().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_year_is_not_found() {
        assert_eq!(
            source().get_tax_year_config(1999).await,
            Err(ReferenceError::NotFound)
        );
    }

    #[test]
    fn test_bad_brackets_surface_as_invalid_data() {
        let brackets = "jurisdiction,tax_year,filing_status,tax_type,min_income,max_income,rate
federal,2025,S,ordinary,100,,0.10
";

        let result = CsvReferenceSource::from_readers(
            brackets.as_bytes(),
            YEARS.as_bytes(),
            THRESHOLDS.as_bytes(),
        );

        assert!(matches!(result, Err(ReferenceError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_source_error() {
        let registry = SourceRegistry::default().with(CsvSourceFactory);
        let spec = "csv:/nonexistent/vest-data".parse().unwrap();

        let result = registry.open(&spec).await;

        assert!(matches!(result, Err(ReferenceError::Source(_))));
    }

    #[tokio::test]
    async fn test_state_levies_are_listed() {
        let levies = "jurisdiction,tax_year,surcharge_threshold,surcharge_rate,sdi_rate,sdi_wage_limit
CA,2026,1000000,0.01,0.009,153164
";

        let source = source().with_state_levies(levies.as_bytes()).unwrap();
        let listed = source.list_state_levies().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].jurisdiction, Jurisdiction::state("CA"));
        assert_eq!(listed[0].sdi_rate, dec!(0.009));
    }

    #[tokio::test]
    async fn test_state_levies_default_to_none() {
        assert_eq!(source().list_state_levies().await, Ok(Vec::new()));
    }

    #[test]
    fn test_bad_state_levy_surfaces_as_invalid_data() {
        let levies = "jurisdiction,tax_year,surcharge_threshold,surcharge_rate,sdi_rate,sdi_wage_limit
federal,2026,1000000,0.01,0.009,153164
";

        let result = source().with_state_levies(levies.as_bytes());

        assert!(matches!(result, Err(ReferenceError::InvalidData(_))));
    }
}

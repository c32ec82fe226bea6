use tracing::{debug, info};

use super::source::{ReferenceError, ReferenceSource};
use crate::calculations::brackets::BracketTableSet;
use crate::calculations::orchestrator::TaxOrchestrator;
use crate::models::{StateLevySet, TaxYearConfigSet};

/// Every bracket table, year config and state levy a source holds, loaded
/// in one pass.
///
/// The snapshot is immutable once loaded; calculations borrow it through
/// [`ReferenceSnapshot::orchestrator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSnapshot {
    pub tables: BracketTableSet,
    pub configs: TaxYearConfigSet,
    pub states: StateLevySet,
}

impl ReferenceSnapshot {
    /// Reads all year configs, bracket tables and state levies from `source`.
    ///
    /// # Errors
    /// * [`ReferenceError::InvalidData`] if a year config or state levy fails
    ///   validation.
    /// * Any error the source returns.
    pub async fn load(source: &dyn ReferenceSource) -> Result<Self, ReferenceError> {
        let mut configs = TaxYearConfigSet::default();
        for year in source.list_tax_years().await? {
            let config = source.get_tax_year_config(year).await?;
            config
                .validate()
                .map_err(|e| ReferenceError::InvalidData(e.to_string()))?;
            debug!(tax_year = year, "loaded year config");
            configs.insert(config);
        }

        let mut tables = BracketTableSet::default();
        for key in source.list_table_keys().await? {
            let table = source.get_bracket_table(&key).await?;
            debug!(table = %key, brackets = table.brackets().len(), "loaded bracket table");
            tables.insert(table);
        }

        let mut states = StateLevySet::default();
        for levy in source.list_state_levies().await? {
            levy.validate()
                .map_err(|e| ReferenceError::InvalidData(e.to_string()))?;
            debug!(state = %levy.jurisdiction, tax_year = levy.tax_year, "loaded state levy");
            states.insert(levy);
        }

        info!(
            years = configs.years().count(),
            tables = tables.len(),
            state_levies = states.len(),
            "reference snapshot loaded"
        );

        Ok(Self {
            tables,
            configs,
            states,
        })
    }

    pub fn orchestrator(&self) -> TaxOrchestrator<'_> {
        TaxOrchestrator::new(&self.tables, &self.configs).with_state_levies(&self.states)
    }
}

//! Opening reference data by name.
//!
//! A data location is written `backend:location`, for example
//! `csv:vest-data/data`. A bare location means the [`DEFAULT_BACKEND`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::info;

use super::snapshot::ReferenceSnapshot;
use super::source::{ReferenceError, ReferenceSource};

pub const DEFAULT_BACKEND: &str = "csv";

/// A backend name and the location handed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub backend: String,
    pub location: String,
}

impl FromStr for SourceSpec {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Single-letter prefixes are drive letters, not backends.
        let (backend, location) = match s.split_once(':') {
            Some((backend, location))
                if backend.len() > 1 && backend.chars().all(|c| c.is_ascii_lowercase()) =>
            {
                (backend, location)
            }
            _ => (DEFAULT_BACKEND, s),
        };
        if location.is_empty() {
            return Err(ReferenceError::Configuration(format!(
                "'{s}' names no data location"
            )));
        }
        Ok(Self {
            backend: backend.to_string(),
            location: location.to_string(),
        })
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.location)
    }
}

/// Opens one kind of [`ReferenceSource`].
#[async_trait]
pub trait SourceFactory: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn open(
        &self,
        location: &str,
    ) -> Result<Box<dyn ReferenceSource>, ReferenceError>;
}

/// The backends a binary knows how to open.
#[derive(Default)]
pub struct SourceRegistry {
    factories: BTreeMap<&'static str, Box<dyn SourceFactory>>,
}

impl SourceRegistry {
    /// Adds `factory`, replacing one with the same backend name.
    pub fn with(
        mut self,
        factory: impl SourceFactory + 'static,
    ) -> Self {
        self.factories.insert(factory.backend(), Box::new(factory));
        self
    }

    /// Registered backend names in sorted order.
    pub fn backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// # Errors
    /// * [`ReferenceError::Configuration`] if `spec` names an unknown backend.
    /// * Any error the backend returns while opening.
    pub async fn open(
        &self,
        spec: &SourceSpec,
    ) -> Result<Box<dyn ReferenceSource>, ReferenceError> {
        let Some(factory) = self.factories.get(spec.backend.as_str()) else {
            return Err(ReferenceError::Configuration(format!(
                "unknown backend '{}' (known: {})",
                spec.backend,
                self.backends().join(", ")
            )));
        };
        factory.open(&spec.location).await
    }

    /// Opens `spec` and loads everything it holds into a snapshot.
    ///
    /// # Errors
    /// Any error from [`SourceRegistry::open`] or [`ReferenceSnapshot::load`].
    pub async fn load(
        &self,
        spec: &SourceSpec,
    ) -> Result<ReferenceSnapshot, ReferenceError> {
        let source = self.open(spec).await?;
        let snapshot = ReferenceSnapshot::load(source.as_ref()).await?;
        info!(source = %spec, "reference data ready");
        Ok(snapshot)
    }
}

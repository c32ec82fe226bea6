//! Read-only access to reference data: bracket tables, year constants and
//! state levies.
//!
//! Calculations never read reference data directly. A [`ReferenceSource`]
//! is loaded once into a [`ReferenceSnapshot`], and every engine borrows
//! from that snapshot.

pub mod factory;
pub mod snapshot;
pub mod source;

pub use factory::{DEFAULT_BACKEND, SourceFactory, SourceRegistry, SourceSpec};
pub use snapshot::ReferenceSnapshot;
pub use source::{ReferenceError, ReferenceSource};

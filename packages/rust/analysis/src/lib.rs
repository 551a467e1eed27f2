//! Typed models for the optional analysis results.
//!
//! Each payload is parsed leniently: unknown fields are ignored, missing or
//! `null` fields take their zero value. [`AnalysisIndexes`] bundles the
//! lookups the enrichment stage needs.

pub mod classify;
pub mod coverage;
pub mod cycles;
pub mod impact;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use archdocs_shared::{AnalysisBundle, AnalysisKind, ArchDocsError, Result};

pub use classify::{CoverageStatus, RiskLevel, coverage_percentage};
pub use coverage::{
    AggregateCoverage, CoverageIndex, CoverageReport, FileCoverage, FunctionCoverage,
};
pub use cycles::{Cycle, CycleIndex, CycleReport};
pub use impact::{ImpactEntry, ImpactIndex, ImpactReport};

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub(crate) fn parse_payload<T: DeserializeOwned>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| ArchDocsError::parse(format!("invalid {what} result: {e}")))
}

// ---------------------------------------------------------------------------
// AnalysisIndexes
// ---------------------------------------------------------------------------

/// Parsed lookups for whichever optional analyses are present.
#[derive(Debug, Clone, Default)]
pub struct AnalysisIndexes {
    pub impact: Option<ImpactIndex>,
    pub coverage: Option<CoverageIndex>,
    pub cycles: Option<CycleIndex>,
}

impl AnalysisIndexes {
    /// Parse every optional payload in `bundle`.
    ///
    /// A payload that fails to parse is logged and treated as absent.
    pub fn from_bundle(bundle: &AnalysisBundle) -> Self {
        Self {
            impact: parse_optional(bundle, AnalysisKind::Impact, ImpactReport::parse)
                .map(ImpactIndex::new),
            coverage: parse_optional(bundle, AnalysisKind::TestCoverage, CoverageReport::parse)
                .map(CoverageIndex::new),
            cycles: parse_optional(bundle, AnalysisKind::CircularDeps, CycleReport::parse)
                .map(CycleIndex::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.impact.is_none() && self.coverage.is_none() && self.cycles.is_none()
    }
}

fn parse_optional<T>(
    bundle: &AnalysisBundle,
    kind: AnalysisKind,
    parse: fn(&str) -> Result<T>,
) -> Option<T> {
    let payload = bundle.get(kind)?;
    match parse(payload) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(analysis = %kind, error = %e, "Ignoring unparseable analysis result");
            None
        }
    }
}

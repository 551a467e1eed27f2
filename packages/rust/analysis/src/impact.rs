//! Change-impact (blast radius) results.

use std::collections::HashMap;

use serde::Deserialize;

use archdocs_shared::Result;

use crate::classify::RiskLevel;
use crate::{nullable, parse_payload};

/// Top-level impact analysis payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImpactReport {
    #[serde(deserialize_with = "nullable")]
    pub impacts: Vec<ImpactEntry>,
}

/// Blast-radius record for one changed target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImpactEntry {
    #[serde(deserialize_with = "nullable")]
    pub target: ImpactTarget,
    #[serde(deserialize_with = "nullable")]
    pub blast_radius: BlastRadius,
    #[serde(deserialize_with = "nullable")]
    pub affected_functions: Vec<AffectedFunction>,
    #[serde(deserialize_with = "nullable")]
    pub entry_points_affected: Vec<EntryPoint>,
}

impl ImpactEntry {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.blast_radius.risk_score)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImpactTarget {
    #[serde(deserialize_with = "nullable")]
    pub file: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlastRadius {
    #[serde(deserialize_with = "nullable")]
    pub direct_dependents: u64,
    #[serde(deserialize_with = "nullable")]
    pub transitive_dependents: u64,
    #[serde(deserialize_with = "nullable")]
    pub affected_files: u64,
    #[serde(deserialize_with = "nullable")]
    pub risk_score: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AffectedFunction {
    #[serde(deserialize_with = "nullable")]
    pub file: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub distance: u32,
    #[serde(deserialize_with = "nullable")]
    pub relationship: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryPoint {
    #[serde(deserialize_with = "nullable")]
    pub file: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

impl ImpactReport {
    pub fn parse(json: &str) -> Result<Self> {
        parse_payload(json, "impact")
    }
}

/// Impact records keyed by target file.
#[derive(Debug, Clone, Default)]
pub struct ImpactIndex {
    by_file: HashMap<String, ImpactEntry>,
}

impl ImpactIndex {
    /// Later records for the same file replace earlier ones.
    pub fn new(report: ImpactReport) -> Self {
        let by_file = report
            .impacts
            .into_iter()
            .map(|entry| (entry.target.file.clone(), entry))
            .collect();
        Self { by_file }
    }

    pub fn get(&self, file: &str) -> Option<&ImpactEntry> {
        self.by_file.get(file)
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

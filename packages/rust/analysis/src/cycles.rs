//! Circular dependency detection results.

use std::collections::HashMap;

use serde::Deserialize;

use archdocs_shared::Result;

use crate::{nullable, parse_payload};

/// Top-level circular dependency payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycleReport {
    #[serde(deserialize_with = "nullable")]
    pub cycles: Vec<Cycle>,
    #[serde(deserialize_with = "nullable")]
    pub summary: CycleSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cycle {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub files: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub edges: Vec<CycleEdge>,
    #[serde(deserialize_with = "nullable")]
    pub severity: String,
    #[serde(deserialize_with = "nullable")]
    pub breaking_suggestion: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycleEdge {
    #[serde(deserialize_with = "nullable")]
    pub source: String,
    #[serde(deserialize_with = "nullable")]
    pub target: String,
    #[serde(deserialize_with = "nullable")]
    pub imported_symbols: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycleSummary {
    #[serde(deserialize_with = "nullable")]
    pub total_cycles: u64,
    #[serde(deserialize_with = "nullable")]
    pub high_severity_count: u64,
}

impl CycleReport {
    pub fn parse(json: &str) -> Result<Self> {
        parse_payload(json, "circular dependency")
    }
}

/// Cycle membership per file.
#[derive(Debug, Clone, Default)]
pub struct CycleIndex {
    cycles: Vec<Cycle>,
    by_file: HashMap<String, Vec<usize>>,
}

impl CycleIndex {
    pub fn new(report: CycleReport) -> Self {
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, cycle) in report.cycles.iter().enumerate() {
            for file in &cycle.files {
                let ids = by_file.entry(file.clone()).or_default();
                // A file listed twice in one cycle is still one membership.
                if ids.last() != Some(&i) {
                    ids.push(i);
                }
            }
        }
        Self {
            cycles: report.cycles,
            by_file,
        }
    }

    /// Cycles `file` takes part in, in report order.
    pub fn cycles_for(&self, file: &str) -> Vec<&Cycle> {
        self.by_file
            .get(file)
            .map(|ids| ids.iter().map(|&i| &self.cycles[i]).collect())
            .unwrap_or_default()
    }

    pub fn in_cycle(&self, file: &str) -> bool {
        self.by_file.contains_key(file)
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }
}

//! Test coverage map results and per-file/per-directory lookups.

use std::collections::HashMap;

use serde::Deserialize;

use archdocs_shared::Result;

use crate::classify::coverage_percentage;
use crate::{nullable, parse_payload};

/// Top-level test coverage payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverageReport {
    #[serde(deserialize_with = "nullable")]
    pub metadata: CoverageMetadata,
    #[serde(deserialize_with = "nullable")]
    pub tested_functions: Vec<TestedFunction>,
    #[serde(deserialize_with = "nullable")]
    pub untested_functions: Vec<UntestedFunction>,
    #[serde(deserialize_with = "nullable")]
    pub coverage_by_file: Vec<FileCoverageEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverageMetadata {
    #[serde(deserialize_with = "nullable")]
    pub coverage_percentage: f64,
    #[serde(deserialize_with = "nullable")]
    pub tested_functions: u64,
    #[serde(deserialize_with = "nullable")]
    pub untested_functions: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestedFunction {
    #[serde(deserialize_with = "nullable")]
    pub file: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub line: u32,
    #[serde(deserialize_with = "nullable")]
    pub test_files: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UntestedFunction {
    #[serde(deserialize_with = "nullable")]
    pub file: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub line: u32,
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    #[serde(deserialize_with = "nullable")]
    pub confidence: String,
    #[serde(deserialize_with = "nullable")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileCoverageEntry {
    #[serde(deserialize_with = "nullable")]
    pub file: String,
    #[serde(deserialize_with = "nullable")]
    pub coverage_percentage: f64,
}

impl CoverageReport {
    pub fn parse(json: &str) -> Result<Self> {
        parse_payload(json, "test coverage")
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Coverage record for one function or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCoverage<'a> {
    Tested { test_files: &'a [String] },
    Untested { reason: &'a str },
}

/// Coverage numbers for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCoverage<'a> {
    pub path: &'a str,
    /// Percentage reported by the service for this file.
    pub percentage: f64,
    /// Tested symbol count.
    pub tested: usize,
    /// Tested plus untested symbol count.
    pub total: usize,
    pub tested_names: &'a [String],
    pub untested_names: &'a [String],
}

/// Coverage rolled up over every file below a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCoverage<'a> {
    /// Children ordered worst-covered first (ties by path).
    pub files: Vec<FileCoverage<'a>>,
    pub tested: usize,
    pub total: usize,
}

impl AggregateCoverage<'_> {
    /// Σtested ÷ Σtotal, or `None` if the children have no symbols at all.
    pub fn percentage(&self) -> Option<f64> {
        coverage_percentage(self.tested, self.total)
    }
}

#[derive(Debug, Clone, Default)]
struct FileSymbols {
    tested: Vec<String>,
    untested: Vec<String>,
}

/// Coverage records indexed by `(file, function)` and by file.
#[derive(Debug, Clone, Default)]
pub struct CoverageIndex {
    tested: HashMap<(String, String), Vec<String>>,
    untested: HashMap<(String, String), String>,
    file_percentages: HashMap<String, f64>,
    symbols: HashMap<String, FileSymbols>,
}

impl CoverageIndex {
    pub fn new(report: CoverageReport) -> Self {
        let mut index = Self::default();

        for f in report.tested_functions {
            index
                .symbols
                .entry(f.file.clone())
                .or_default()
                .tested
                .push(f.name.clone());
            index.tested.insert((f.file, f.name), f.test_files);
        }

        for f in report.untested_functions {
            index
                .symbols
                .entry(f.file.clone())
                .or_default()
                .untested
                .push(f.name.clone());
            index.untested.insert((f.file, f.name), f.reason);
        }

        for f in report.coverage_by_file {
            index.file_percentages.insert(f.file, f.coverage_percentage);
        }

        index
    }

    /// Tested records win over untested ones for the same function.
    pub fn function(&self, file: &str, name: &str) -> Option<FunctionCoverage<'_>> {
        let key = (file.to_string(), name.to_string());
        if let Some(test_files) = self.tested.get(&key) {
            return Some(FunctionCoverage::Tested { test_files });
        }
        self.untested
            .get(&key)
            .map(|reason| FunctionCoverage::Untested { reason })
    }

    /// Coverage for a file that has a per-file percentage entry.
    pub fn file(&self, path: &str) -> Option<FileCoverage<'_>> {
        let (path, percentage) = self.file_percentages.get_key_value(path)?;
        Some(self.file_coverage(path, *percentage))
    }

    /// Files whose path starts with `dir + "/"`, or `None` if there are none.
    pub fn aggregate(&self, dir: &str) -> Option<AggregateCoverage<'_>> {
        let prefix = if dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };

        let mut files: Vec<FileCoverage<'_>> = self
            .file_percentages
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, pct)| self.file_coverage(path, *pct))
            .collect();

        if files.is_empty() {
            return None;
        }

        files.sort_by(|a, b| {
            a.percentage
                .total_cmp(&b.percentage)
                .then_with(|| a.path.cmp(b.path))
        });

        let tested = files.iter().map(|f| f.tested).sum();
        let total = files.iter().map(|f| f.total).sum();

        Some(AggregateCoverage {
            files,
            tested,
            total,
        })
    }

    pub fn has_file_entries(&self) -> bool {
        !self.file_percentages.is_empty()
    }

    fn file_coverage<'a>(&'a self, path: &'a str, percentage: f64) -> FileCoverage<'a> {
        const NONE: &[String] = &[];
        let (tested_names, untested_names) = match self.symbols.get(path) {
            Some(s) => (s.tested.as_slice(), s.untested.as_slice()),
            None => (NONE, NONE),
        };
        FileCoverage {
            path,
            percentage,
            tested: tested_names.len(),
            total: tested_names.len() + untested_names.len(),
            tested_names,
            untested_names,
        }
    }
}

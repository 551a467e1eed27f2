//! Core domain types shared by the client, orchestrator and enrichment stages.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ArchDocsError, Result};

// ---------------------------------------------------------------------------
// AnalysisKind
// ---------------------------------------------------------------------------

/// The four analysis services a run can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    /// Dependency graph extraction. The document tree is generated from it.
    Graph,
    /// Change-impact (blast radius) analysis.
    Impact,
    /// Test coverage map.
    TestCoverage,
    /// Circular dependency detection.
    CircularDeps,
}

impl AnalysisKind {
    /// Every kind, in the order results are reported.
    pub const ALL: [AnalysisKind; 4] = [
        Self::Graph,
        Self::Impact,
        Self::TestCoverage,
        Self::CircularDeps,
    ];

    /// Stable name used in logs, config and warnings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Impact => "impact",
            Self::TestCoverage => "test-coverage",
            Self::CircularDeps => "circular-deps",
        }
    }

    /// File name the raw payload is saved under in the work directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Graph => "graph.json",
            Self::Impact => "impact.json",
            Self::TestCoverage => "test-coverage.json",
            Self::CircularDeps => "circular-deps.json",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EndpointConfig
// ---------------------------------------------------------------------------

/// One analysis endpoint the orchestrator submits the workspace to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Which analysis this endpoint produces.
    pub kind: AnalysisKind,
    /// Fully resolved submission URL.
    pub url: Url,
    /// Whether a failure of this endpoint aborts the run.
    pub required: bool,
}

impl EndpointConfig {
    pub fn new(kind: AnalysisKind, url: Url, required: bool) -> Self {
        Self {
            kind,
            url,
            required,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisBundle
// ---------------------------------------------------------------------------

/// Raw JSON results collected from every endpoint of one run.
///
/// Payloads are kept as the exact text returned by the service so the graph
/// can be handed to the markdown generator untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisBundle {
    payloads: HashMap<AnalysisKind, String>,
}

impl AnalysisBundle {
    /// Start a bundle from the required graph payload.
    pub fn new(graph: impl Into<String>) -> Self {
        let mut payloads = HashMap::new();
        payloads.insert(AnalysisKind::Graph, graph.into());
        Self { payloads }
    }

    /// Build a bundle from collected payloads. Fails if the graph is missing.
    pub fn from_payloads(payloads: HashMap<AnalysisKind, String>) -> Result<Self> {
        if !payloads.contains_key(&AnalysisKind::Graph) {
            return Err(ArchDocsError::validation(
                "analysis bundle is missing the dependency graph",
            ));
        }
        Ok(Self { payloads })
    }

    /// Bundle holding only optional analyses, for enriching an existing tree.
    pub fn enrichment_only(payloads: HashMap<AnalysisKind, String>) -> Self {
        let mut payloads = payloads;
        payloads.remove(&AnalysisKind::Graph);
        Self { payloads }
    }

    /// Insert or replace a payload.
    pub fn insert(&mut self, kind: AnalysisKind, payload: impl Into<String>) {
        self.payloads.insert(kind, payload.into());
    }

    /// The raw payload for `kind`, if that analysis succeeded.
    pub fn get(&self, kind: AnalysisKind) -> Option<&str> {
        self.payloads.get(&kind).map(String::as_str)
    }

    /// The dependency graph payload (empty when built via [`Self::enrichment_only`]).
    pub fn graph(&self) -> &str {
        self.get(AnalysisKind::Graph).unwrap_or_default()
    }

    /// Whether any optional analysis is present.
    pub fn has_enrichment_data(&self) -> bool {
        self.payloads.keys().any(|k| *k != AnalysisKind::Graph)
    }

    /// Present payloads in [`AnalysisKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (AnalysisKind, &str)> {
        AnalysisKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|p| (kind, p)))
    }
}

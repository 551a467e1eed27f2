//! Merges optional analysis results into generated entity documents.
//!
//! Each document is matched on its `file_path`, `function_name` and
//! `node_type` keys. Matching rules append metadata keys and queue `## `
//! sections; a document is rewritten only if some rule added content.

use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, info, instrument, warn};

use archdocs_analysis::{
    AnalysisIndexes, CoverageIndex, CoverageStatus, CycleIndex, FunctionCoverage, ImpactIndex,
};
use archdocs_markdown::{EntityDocument, coverage_bar, list_items, symbol_line};
use archdocs_shared::{AnalysisBundle, ArchDocsError, Result};

/// Entry points listed under an impact section before the list is cut off.
pub const MAX_ENTRY_POINTS: usize = 10;

const FUNCTION_TYPES: &[&str] = &["Function", "Method"];
const CONTAINER_TYPES: &[&str] = &["Directory", "Module", "Package", "Namespace"];
const FILE_TYPE: &str = "File";

/// Totals for one pass over a content directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Markdown files found.
    pub scanned: usize,
    /// Files without a front matter block.
    pub skipped: usize,
    /// Files rewritten with new content.
    pub enriched: usize,
}

/// Applies the enrichment rules for whichever analyses are present.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    indexes: AnalysisIndexes,
}

impl Enricher {
    pub fn new(indexes: AnalysisIndexes) -> Self {
        Self { indexes }
    }

    /// Parse the optional payloads of `bundle`; unparseable ones are dropped.
    pub fn from_bundle(bundle: &AnalysisBundle) -> Self {
        Self::new(AnalysisIndexes::from_bundle(bundle))
    }

    pub fn has_data(&self) -> bool {
        !self.indexes.is_empty()
    }

    /// Run every rule against `doc`. Returns whether anything was added.
    pub fn enrich_document(&self, doc: &mut EntityDocument) -> bool {
        let Some(file_path) = doc.get("file_path").map(str::to_owned) else {
            return false;
        };
        let node_type = doc.get("node_type").unwrap_or_default().to_owned();
        let function_name = doc.get("function_name").map(str::to_owned);

        let mut modified = false;

        if let Some(impact) = &self.indexes.impact {
            modified |= apply_impact(doc, impact, &file_path);
        }

        if let Some(coverage) = &self.indexes.coverage {
            if FUNCTION_TYPES.contains(&node_type.as_str()) {
                if let Some(name) = &function_name {
                    modified |= apply_function_coverage(doc, coverage, &file_path, name);
                }
            }
            if node_type == FILE_TYPE {
                modified |= apply_file_coverage(doc, coverage, &file_path);
            }
            if CONTAINER_TYPES.contains(&node_type.as_str()) {
                modified |= apply_aggregate_coverage(doc, coverage, &file_path);
            }
        }

        // A missing or failed cycle analysis reads the same as one that found no cycles.
        let cycles = self.indexes.cycles.as_ref();
        modified |= apply_cycles(doc, cycles, &file_path, node_type == FILE_TYPE);

        modified
    }

    /// Enrich one document's text. `None` if it has no front matter or nothing matched.
    pub fn enrich_text(&self, content: &str) -> Option<String> {
        let mut doc = EntityDocument::parse(content)?;
        self.enrich_document(&mut doc).then(|| doc.render())
    }

    /// Rewrite every `.md` file under `content_dir` that gains content.
    #[instrument(skip_all, fields(dir = %content_dir.display()))]
    pub fn enrich_tree(&self, content_dir: &Path) -> Result<EnrichmentSummary> {
        let mut summary = EnrichmentSummary::default();

        let walker = WalkBuilder::new(content_dir).standard_filters(false).build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file())
                || path.extension().is_none_or(|ext| ext != "md")
            {
                continue;
            }
            summary.scanned += 1;

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable document");
                    summary.skipped += 1;
                    continue;
                }
            };

            let Some(mut doc) = EntityDocument::parse(&content) else {
                debug!(path = %path.display(), "no front matter, skipping");
                summary.skipped += 1;
                continue;
            };

            if self.enrich_document(&mut doc) {
                std::fs::write(path, doc.render()).map_err(|e| ArchDocsError::io(path, e))?;
                summary.enriched += 1;
            }
        }

        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            enriched = summary.enriched,
            "enrichment complete"
        );
        Ok(summary)
    }
}

/// Enrich the tree under `content_dir` with the optional analyses in `bundle`.
pub fn enrich(content_dir: &Path, bundle: &AnalysisBundle) -> Result<EnrichmentSummary> {
    Enricher::from_bundle(bundle).enrich_tree(content_dir)
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn apply_impact(doc: &mut EntityDocument, impact: &ImpactIndex, file_path: &str) -> bool {
    let Some(entry) = impact.get(file_path) else {
        return false;
    };
    let radius = &entry.blast_radius;
    let level = entry.risk_level();

    doc.insert_quoted("impact_level", level.as_str());
    doc.insert("impact_risk_score", format_args!("{:.1}", radius.risk_score));
    doc.insert("impact_direct_dependents", radius.direct_dependents);
    doc.insert("impact_transitive_dependents", radius.transitive_dependents);
    doc.insert("impact_affected_files", radius.affected_files);

    let mut lines = vec![
        format!("- Risk Score: {:.1} ({level})", radius.risk_score),
        format!("- Direct Dependents: {}", radius.direct_dependents),
        format!("- Transitive Dependents: {}", radius.transitive_dependents),
        format!("- Affected Files: {}", radius.affected_files),
    ];
    if !entry.entry_points_affected.is_empty() {
        lines.push(format!(
            "- Entry Points Affected: {}",
            entry.entry_points_affected.len()
        ));
        lines.extend(
            entry
                .entry_points_affected
                .iter()
                .take(MAX_ENTRY_POINTS)
                .map(|ep| format!("  - {} ({})", ep.name, ep.file)),
        );
    }

    doc.add_section("Impact Analysis", &lines.join("\n"));
    true
}

fn apply_function_coverage(
    doc: &mut EntityDocument,
    coverage: &CoverageIndex,
    file_path: &str,
    name: &str,
) -> bool {
    match coverage.function(file_path, name) {
        Some(FunctionCoverage::Tested { test_files }) => {
            doc.insert_quoted("test_coverage", CoverageStatus::Tested.as_str());
            let mut lines = vec![format!(
                "- Status: Tested by {} test file(s)",
                test_files.len()
            )];
            lines.extend(test_files.iter().map(|tf| format!("  - {tf}")));
            doc.add_section("Test Coverage", &lines.join("\n"));
            true
        }
        Some(FunctionCoverage::Untested { reason }) => {
            doc.insert_quoted("test_coverage", CoverageStatus::Untested.as_str());
            doc.add_section(
                "Test Coverage",
                &format!("- Status: Untested\n- Reason: {reason}"),
            );
            true
        }
        None => false,
    }
}

fn apply_file_coverage(doc: &mut EntityDocument, coverage: &CoverageIndex, file_path: &str) -> bool {
    let Some(file) = coverage.file(file_path) else {
        return false;
    };

    let status = CoverageStatus::from_percentage(file.percentage);
    doc.insert_quoted("test_coverage", status.as_str());
    doc.insert("test_coverage_pct", format_args!("{:.1}", file.percentage));

    let items = std::iter::once(coverage_bar(file.path, file.percentage, file.tested, file.total))
        .chain(file.tested_names.iter().map(|n| symbol_line(n, true)))
        .chain(file.untested_names.iter().map(|n| symbol_line(n, false)));
    doc.add_section("Test Coverage", &list_items(items));
    true
}

fn apply_aggregate_coverage(
    doc: &mut EntityDocument,
    coverage: &CoverageIndex,
    dir: &str,
) -> bool {
    let Some(aggregate) = coverage.aggregate(dir) else {
        return false;
    };

    let bars = aggregate
        .files
        .iter()
        .map(|f| coverage_bar(f.path, f.percentage, f.tested, f.total));
    doc.add_section("Test Coverage", &list_items(bars));

    // No symbols below the directory means unknown coverage, not 0 %.
    if let Some(pct) = aggregate.percentage() {
        doc.insert_quoted("test_coverage", CoverageStatus::from_percentage(pct).as_str());
        doc.insert("test_coverage_pct", format_args!("{pct:.1}"));
    }
    true
}

fn apply_cycles(
    doc: &mut EntityDocument,
    cycles: Option<&CycleIndex>,
    file_path: &str,
    is_file: bool,
) -> bool {
    let member_of = cycles.map(|c| c.cycles_for(file_path)).unwrap_or_default();
    if member_of.is_empty() {
        return is_file && doc.insert_quoted("dependency_health", "Clean");
    }

    doc.insert_quoted("dependency_health", "In Cycle");
    let mut lines = Vec::new();
    for cycle in member_of {
        lines.push(format!("- {} (severity: {})", cycle.id, cycle.severity));
        if !cycle.breaking_suggestion.is_empty() {
            lines.push(format!("  - Suggestion: {}", cycle.breaking_suggestion));
        }
    }
    doc.add_section("Circular Dependencies", &lines.join("\n"));
    true
}

#[cfg(test)]
mod tests {
    use archdocs_shared::AnalysisKind;

    use super::*;

    const IMPACT: &str = r#"{"impacts": [{
        "target": {"file": "src/core/a.ts", "name": "a", "type": "file"},
        "blastRadius": {"directDependents": 3, "transitiveDependents": 12,
                        "affectedFiles": 7, "riskScore": 42.5},
        "entryPointsAffected": [
            {"file": "e0.ts", "name": "m0"}, {"file": "e1.ts", "name": "m1"},
            {"file": "e2.ts", "name": "m2"}, {"file": "e3.ts", "name": "m3"},
            {"file": "e4.ts", "name": "m4"}, {"file": "e5.ts", "name": "m5"},
            {"file": "e6.ts", "name": "m6"}, {"file": "e7.ts", "name": "m7"},
            {"file": "e8.ts", "name": "m8"}, {"file": "e9.ts", "name": "m9"},
            {"file": "e10.ts", "name": "m10"}, {"file": "e11.ts", "name": "m11"}
        ]
    }]}"#;

    const COVERAGE: &str = r#"{
        "testedFunctions": [
            {"file": "src/core/a.ts", "name": "alpha", "testFiles": ["test/a.test.ts"]},
            {"file": "src/core/a.ts", "name": "beta", "testFiles": ["test/a.test.ts", "test/b.test.ts"]},
            {"file": "src/core/a.ts", "name": "gamma", "testFiles": []},
            {"file": "src/core/b.ts", "name": "delta", "testFiles": ["test/b.test.ts"]}
        ],
        "untestedFunctions": [
            {"file": "src/core/a.ts", "name": "omega", "reason": "no_test_reference"},
            {"file": "src/core/b.ts", "name": "epsilon", "reason": "dead_code"}
        ],
        "coverageByFile": [
            {"file": "src/core/a.ts", "coveragePercentage": 75.0},
            {"file": "src/core/b.ts", "coveragePercentage": 50.0},
            {"file": "src/empty/c.ts", "coveragePercentage": 0.0}
        ]
    }"#;

    const CYCLES: &str = r#"{"cycles": [
        {"id": "cycle-1", "files": ["src/core/b.ts", "src/util.ts"], "severity": "high",
         "breakingSuggestion": "Extract shared types"}
    ]}"#;

    fn bundle(kinds: &[(AnalysisKind, &str)]) -> AnalysisBundle {
        let mut bundle = AnalysisBundle::new("{}");
        for (kind, payload) in kinds {
            bundle.insert(*kind, *payload);
        }
        bundle
    }

    fn full() -> Enricher {
        Enricher::from_bundle(&bundle(&[
            (AnalysisKind::Impact, IMPACT),
            (AnalysisKind::TestCoverage, COVERAGE),
            (AnalysisKind::CircularDeps, CYCLES),
        ]))
    }

    fn doc(meta: &str) -> String {
        format!("---\n{meta}\n---\n# Entity\n")
    }

    #[test]
    fn file_document_gets_every_matching_rule_in_order() {
        let out = full()
            .enrich_text(&doc("file_path: \"src/core/a.ts\"\nnode_type: \"File\""))
            .unwrap();

        assert!(out.contains("impact_level: \"High\"\n"));
        assert!(out.contains("impact_risk_score: 42.5\n"));
        assert!(out.contains("impact_direct_dependents: 3\n"));
        assert!(out.contains("impact_transitive_dependents: 12\n"));
        assert!(out.contains("impact_affected_files: 7\n"));
        assert!(out.contains("test_coverage: \"Tested\"\n"));
        assert!(out.contains("test_coverage_pct: 75.0\n"));
        assert!(out.contains("dependency_health: \"Clean\"\n---\n"));

        let impact = out.find("## Impact Analysis").unwrap();
        let coverage = out.find("## Test Coverage").unwrap();
        let body = out.find("# Entity").unwrap();
        assert!(impact < coverage && coverage < body);
        assert!(!out.contains("## Circular Dependencies"));
    }

    #[test]
    fn impact_lists_at_most_ten_entry_points() {
        let out = full()
            .enrich_text(&doc("file_path: src/core/a.ts\nnode_type: Class"))
            .unwrap();
        assert!(out.contains("- Risk Score: 42.5 (High)\n"));
        assert!(out.contains("- Entry Points Affected: 12\n"));
        assert!(out.contains("  - m9 (e9.ts)"));
        assert!(!out.contains("  - m10 (e10.ts)"));
    }

    #[test]
    fn file_coverage_lists_symbols() {
        let out = full()
            .enrich_text(&doc("file_path: src/core/a.ts\nnode_type: File"))
            .unwrap();
        assert!(out.contains(r#"<span class="cov-ratio">(3/4)</span>"#));
        assert!(out.contains(r#"<span class="cov-check">✓</span> beta"#));
        assert!(out.contains(r#"<span class="cov-x">✗</span> omega"#));
    }

    #[test]
    fn function_coverage_tested_and_untested() {
        let enricher = full();
        let tested = enricher
            .enrich_text(&doc(
                "file_path: src/core/a.ts\nnode_type: Function\nfunction_name: beta",
            ))
            .unwrap();
        assert!(tested.contains("- Status: Tested by 2 test file(s)\n  - test/a.test.ts\n  - test/b.test.ts"));

        let untested = enricher
            .enrich_text(&doc(
                "file_path: src/core/b.ts\nnode_type: Method\nfunction_name: epsilon",
            ))
            .unwrap();
        assert!(untested.contains("test_coverage: \"Untested\""));
        assert!(untested.contains("- Status: Untested\n- Reason: dead_code"));
    }

    #[test]
    fn directory_aggregates_children_worst_first() {
        let out = full()
            .enrich_text(&doc("file_path: src/core\nnode_type: Directory"))
            .unwrap();
        assert!(out.contains("test_coverage_pct: 66.7\n"));
        assert!(out.contains("test_coverage: \"Tested\"\n"));
        let b = out.find("cov-label\">src/core/b.ts").unwrap();
        let a = out.find("cov-label\">src/core/a.ts").unwrap();
        assert!(b < a);
    }

    #[test]
    fn symbolless_directory_gets_bars_without_metadata() {
        let out = full()
            .enrich_text(&doc("file_path: src/empty\nnode_type: Package"))
            .unwrap();
        assert!(out.contains("## Test Coverage"));
        assert!(!out.contains("test_coverage:"));
        assert!(!out.contains("test_coverage_pct:"));
    }

    #[test]
    fn cycle_membership_excludes_clean() {
        let out = full()
            .enrich_text(&doc("file_path: src/util.ts\nnode_type: File"))
            .unwrap();
        assert!(out.contains("dependency_health: \"In Cycle\""));
        assert!(!out.contains("\"Clean\""));
        assert!(out.contains(
            "## Circular Dependencies\n\n- cycle-1 (severity: high)\n  - Suggestion: Extract shared types"
        ));
    }

    #[test]
    fn clean_without_cycle_analysis() {
        let enricher = Enricher::from_bundle(&bundle(&[(AnalysisKind::Impact, IMPACT)]));
        let out = enricher
            .enrich_text(&doc("file_path: src/other.ts\nnode_type: File"))
            .unwrap();
        assert!(out.contains("dependency_health: \"Clean\"\n---\n"));
        assert!(!out.contains("## Circular Dependencies"));

        // Only files are ever marked clean.
        assert!(enricher
            .enrich_text(&doc("file_path: src/other.ts\nnode_type: Class"))
            .is_none());
    }

    #[test]
    fn coverage_only_file_is_marked_clean() {
        let enricher = Enricher::from_bundle(&bundle(&[(AnalysisKind::TestCoverage, COVERAGE)]));
        let out = enricher
            .enrich_text(&doc("file_path: src/core/a.ts\nnode_type: File"))
            .unwrap();
        assert!(out.contains("test_coverage_pct: 75.0\n"));
        assert!(out.contains("dependency_health: \"Clean\""));
        assert!(!out.contains("In Cycle"));
    }

    #[test]
    fn unparseable_cycles_read_as_no_cycles() {
        let enricher = Enricher::from_bundle(&bundle(&[
            (AnalysisKind::TestCoverage, COVERAGE),
            (AnalysisKind::CircularDeps, "{broken"),
        ]));
        let out = enricher
            .enrich_text(&doc("file_path: src/util.ts\nnode_type: File"))
            .unwrap();
        assert!(out.contains("dependency_health: \"Clean\""));
    }

    #[test]
    fn null_suggestion_keeps_cycle_analysis() {
        let enricher = Enricher::from_bundle(&bundle(&[(
            AnalysisKind::CircularDeps,
            r#"{"cycles": [{"id": "c1", "files": ["a.ts", "b.ts"], "severity": "high",
                            "breakingSuggestion": null}]}"#,
        )]));
        let out = enricher
            .enrich_text(&doc("file_path: a.ts\nnode_type: File"))
            .unwrap();
        assert!(out.contains("dependency_health: \"In Cycle\""));
        assert!(out.contains("- c1 (severity: high)\n"));
        assert!(!out.contains("Suggestion:"));
    }

    #[test]
    fn existing_keys_are_kept() {
        // The only matching rule would add an existing key, so nothing changes.
        let unchanged = full().enrich_text(&doc(
            "file_path: src/other.ts\nnode_type: File\ndependency_health: \"Unknown\"",
        ));
        assert!(unchanged.is_none());

        let out = full()
            .enrich_text(&doc("file_path: src/core/a.ts\nnode_type: File\nimpact_level: Low"))
            .unwrap();
        assert_eq!(out.matches("impact_level:").count(), 1);
        assert!(out.contains("impact_level: Low"));
    }

    #[test]
    fn unmatched_or_malformed_documents_are_untouched() {
        let enricher = full();
        assert!(enricher.enrich_text("# no front matter\n").is_none());
        assert!(enricher.enrich_text(&doc("title: x")).is_none());
        assert!(enricher
            .enrich_text(&doc("file_path: nowhere.rs\nnode_type: Class"))
            .is_none());
    }

    #[test]
    fn bad_payload_disables_its_rules_only() {
        let enricher = Enricher::from_bundle(&bundle(&[
            (AnalysisKind::Impact, "{not json"),
            (AnalysisKind::CircularDeps, CYCLES),
        ]));
        let out = enricher
            .enrich_text(&doc("file_path: src/core/a.ts\nnode_type: File"))
            .unwrap();
        assert!(!out.contains("impact_level"));
        assert!(out.contains("dependency_health: \"Clean\""));
    }

    #[test]
    fn tree_walk_rewrites_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("files");
        std::fs::create_dir_all(&nested).unwrap();

        let matching = nested.join("a.md");
        let unmatched = nested.join("other.md");
        let plain = dir.path().join("readme.md");
        let not_md = dir.path().join("a.txt");
        std::fs::write(&matching, doc("file_path: src/core/a.ts\nnode_type: File")).unwrap();
        std::fs::write(&unmatched, doc("file_path: x.rs\nnode_type: Class")).unwrap();
        std::fs::write(&plain, "# plain\n").unwrap();
        std::fs::write(&not_md, doc("file_path: src/core/a.ts\nnode_type: File")).unwrap();

        let summary = full().enrich_tree(dir.path()).unwrap();
        assert_eq!(
            summary,
            EnrichmentSummary {
                scanned: 3,
                skipped: 1,
                enriched: 1
            }
        );

        assert!(std::fs::read_to_string(&matching).unwrap().contains("## Impact Analysis"));
        assert_eq!(
            std::fs::read_to_string(&unmatched).unwrap(),
            doc("file_path: x.rs\nnode_type: Class")
        );
        assert!(!std::fs::read_to_string(&not_md).unwrap().contains("impact_level"));
    }

    fn copy_tree(from: &Path, to: &Path) {
        std::fs::create_dir_all(to).unwrap();
        for entry in std::fs::read_dir(from).unwrap() {
            let entry = entry.unwrap();
            let dest = to.join(entry.file_name());
            if entry.file_type().unwrap().is_dir() {
                copy_tree(&entry.path(), &dest);
            } else {
                std::fs::copy(entry.path(), dest).unwrap();
            }
        }
    }

    fn fixture(rel: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/{rel}")).unwrap()
    }

    #[test]
    fn fixture_tree_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        copy_tree(Path::new("../../../fixtures/docs"), dir.path());

        let bundle = bundle(&[
            (AnalysisKind::Impact, fixture("analysis/impact.json").as_str()),
            (AnalysisKind::TestCoverage, fixture("analysis/test-coverage.json").as_str()),
            (AnalysisKind::CircularDeps, fixture("analysis/circular-deps.json").as_str()),
        ]);
        let summary = enrich(dir.path(), &bundle).unwrap();
        assert_eq!(
            summary,
            EnrichmentSummary {
                scanned: 6,
                skipped: 1,
                enriched: 5
            }
        );

        let read = |rel: &str| std::fs::read_to_string(dir.path().join(rel)).unwrap();

        let router = read("files/router.md");
        assert!(router.contains("language: \"typescript\"\nimpact_level: \"High\"\n"));
        assert!(router.contains("test_coverage_pct: 66.7\n"));
        assert!(router.contains("dependency_health: \"In Cycle\"\n---\n"));
        assert!(router.contains("  - main (src/index.ts)\n  - run (src/cli.ts)"));
        assert!(router.contains("Move the Route type into src/server/types.ts"));
        assert!(router.ends_with("# router.ts\n\nRoutes incoming requests to handlers.\n"));

        let strings = read("files/strings.md");
        assert!(strings.contains("impact_level: \"Low\""));
        assert!(strings.contains("dependency_health: \"Clean\""));
        assert!(!strings.contains("Entry Points Affected"));

        assert!(read("functions/route.md").contains("- Status: Tested by 1 test file(s)"));
        assert!(read("functions/teardown.md").contains("- Reason: no_test_reference"));

        let server = read("directories/server.md");
        assert!(server.contains("test_coverage_pct: 66.7"));
        assert!(server.contains("cov-label\">src/server/router.ts"));
        assert!(!server.contains("dependency_health"));

        assert_eq!(read("index.md"), fixture("docs/index.md"));
    }
}

//! End-to-end `run` pipeline: workspace → archive → analyses → documents → site.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use archdocs_client::Payload;
use archdocs_shared::{
    AnalysisBundle, AnalysisKind, ArchDocsError, ArchiveConfig, EndpointConfig, PollPolicy,
    Result,
};

use crate::archive;
use crate::enrichment::Enricher;
use crate::orchestrator::Orchestrator;
use crate::site::{self, SiteParams};

/// Repository the docs are built for, derived from an `owner/repo` slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Owner part of the slug, when the slug has one.
    pub owner: Option<String>,
    pub name: String,
    pub url: String,
}

impl RepoInfo {
    /// Parse a `GITHUB_REPOSITORY` style slug. Returns `None` for an empty slug.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim();
        if slug.is_empty() {
            return None;
        }
        let (owner, name) = match slug.split_once('/') {
            Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
            None => (None, slug.to_string()),
        };
        Some(Self {
            owner,
            name,
            url: format!("https://github.com/{slug}"),
        })
    }
}

/// `<repo> Architecture Docs`, or `Architecture Docs` without a repository.
pub fn default_site_name(repo: Option<&RepoInfo>) -> String {
    match repo {
        Some(repo) => format!("{} Architecture Docs", repo.name),
        None => "Architecture Docs".to_string(),
    }
}

/// GitHub Pages URL of the repository, falling back to its URL, then `https://example.com`.
pub fn default_base_url(repo: Option<&RepoInfo>) -> String {
    match repo {
        Some(RepoInfo {
            owner: Some(owner),
            name,
            ..
        }) => format!("https://{owner}.github.io/{name}"),
        Some(repo) => repo.url.clone(),
        None => "https://example.com".to_string(),
    }
}

/// Fully resolved settings for one pipeline run.
#[derive(Clone)]
pub struct RunConfig {
    /// Directory archived for analysis; also the site's source dir.
    pub workspace: PathBuf,
    /// API key sent with every analysis request.
    pub credential: String,
    pub endpoints: Vec<EndpointConfig>,
    pub policy: PollPolicy,
    pub archive: ArchiveConfig,
    pub site_name: String,
    pub base_url: String,
    /// Where the built site is written.
    pub output_dir: PathBuf,
    /// Explicit templates directory; bundled locations are searched when unset.
    pub templates_dir: Option<PathBuf>,
    pub repo: Option<RepoInfo>,
    /// Document generator program.
    pub generator: String,
    /// Site builder program.
    pub builder: String,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("workspace", &self.workspace)
            .field("credential", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("policy", &self.policy)
            .field("archive", &self.archive)
            .field("site_name", &self.site_name)
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("templates_dir", &self.templates_dir)
            .field("repo", &self.repo)
            .field("generator", &self.generator)
            .field("builder", &self.builder)
            .finish()
    }
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct RunResult {
    /// Absolute path of the built site.
    pub site_path: PathBuf,
    /// Entity documents produced by the generator.
    pub entity_count: usize,
    /// HTML pages produced by the site builder.
    pub page_count: usize,
    /// Documents that gained analysis content.
    pub enriched: usize,
    /// One line per failed optional endpoint.
    pub warnings: Vec<String>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the current phase finishes.
    fn phase_done(&self);
    /// A line of detail within the current phase.
    fn detail(&self, message: &str);
    /// A non-fatal problem, such as a failed optional endpoint.
    fn warning(&self, message: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn phase_done(&self) {}
    fn detail(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn done(&self, _result: &RunResult) {}
}

/// Write each payload of `bundle` to `dir` under its analysis file name.
///
/// Returns the path of the graph file.
pub fn save_bundle(bundle: &AnalysisBundle, dir: &Path) -> Result<PathBuf> {
    for (kind, payload) in bundle.iter() {
        let path = dir.join(kind.file_name());
        std::fs::write(&path, payload).map_err(|e| ArchDocsError::io(&path, e))?;
        info!(analysis = %kind, path = %path.display(), "analysis saved");
    }
    Ok(dir.join(AnalysisKind::Graph.file_name()))
}

/// Run the full pipeline.
///
/// 1. Archive the workspace
/// 2. Run every analysis endpoint
/// 3. Save the results to a scratch directory
/// 4. Generate entity documents from the graph
/// 5. Enrich them with the optional analyses
/// 6. Build the site
/// 7. Rewrite root-relative links for subdirectory hosting
#[instrument(skip_all, fields(workspace = %config.workspace.display()))]
pub async fn run(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunResult> {
    let start = Instant::now();
    info!(
        site_name = %config.site_name,
        base_url = %config.base_url,
        output_dir = %config.output_dir.display(),
        "starting run pipeline"
    );

    // --- Phase 1: Archive ---
    progress.phase("Creating repository archive");
    let (archive_path, stats) = archive::archive_to_temp(&config.workspace, &config.archive)?;
    progress.detail(&format!(
        "Archive created: {} files ({:.2} MB)",
        stats.files,
        stats.bytes as f64 / (1024.0 * 1024.0)
    ));
    let payload = Arc::new(Payload::from_path(&archive_path).await?);
    progress.phase_done();

    // --- Phase 2: Analyses ---
    progress.phase("Calling analysis endpoints");
    let orchestrator = Orchestrator::new(config.endpoints.clone(), config.policy)?;
    let outcome = orchestrator.run(&config.credential, payload).await?;
    drop(archive_path);

    let warnings: Vec<String> = outcome.warnings.iter().map(ToString::to_string).collect();
    for warning in &warnings {
        progress.warning(warning);
    }
    for (kind, body) in outcome.bundle.iter() {
        progress.detail(&format!("{kind}: received {} bytes", body.len()));
    }
    progress.phase_done();

    // --- Phase 3: Save ---
    progress.phase("Saving analysis data");
    let work_dir = tempfile::Builder::new()
        .prefix("arch-docs-")
        .tempdir()
        .map_err(|e| ArchDocsError::io(std::env::temp_dir(), e))?;
    let graph_path = save_bundle(&outcome.bundle, work_dir.path())?;
    progress.phase_done();

    // --- Phase 4: Generate ---
    progress.phase("Generating markdown from graph");
    let content_dir = work_dir.path().join("content");
    let repo = config.repo.as_ref();
    let entity_count = site::generate_docs(
        &config.generator,
        &graph_path,
        &content_dir,
        repo.map(|r| r.name.as_str()),
        repo.map(|r| r.url.as_str()),
    )
    .await?;
    progress.detail(&format!("Generated {entity_count} markdown files"));
    progress.phase_done();

    // --- Phase 5: Enrich ---
    let mut enriched = 0;
    if outcome.bundle.has_enrichment_data() {
        progress.phase("Enriching entities with analysis data");
        let summary = Enricher::from_bundle(&outcome.bundle).enrich_tree(&content_dir)?;
        enriched = summary.enriched;
        progress.detail(&format!(
            "Enriched {enriched} entity files with analysis data"
        ));
        progress.phase_done();
    }

    // --- Phase 6: Build ---
    progress.phase("Building static site");
    let templates_dir =
        site::resolve_templates_dir(config.templates_dir.as_deref(), &config.workspace);
    let site_config = work_dir.path().join("pssg.yaml");
    site::write_pssg_config(
        &site_config,
        &SiteParams {
            site_name: &config.site_name,
            base_url: &config.base_url,
            repo_url: repo.map_or("", |r| r.url.as_str()),
            repo_name: repo.map_or("", |r| r.name.as_str()),
            content_dir: &content_dir,
            templates_dir: &templates_dir,
            output_dir: &config.output_dir,
            source_dir: &config.workspace,
        },
    )?;
    let page_count = site::build_site(&config.builder, &site_config, &config.output_dir).await?;
    progress.detail(&format!("Built {page_count} HTML pages"));
    progress.phase_done();

    // --- Phase 7: Subdirectory paths ---
    if let Some(prefix) = site::path_prefix(&config.base_url) {
        progress.phase("Rewriting paths for subdirectory deployment");
        progress.detail(&format!("Path prefix: {prefix}"));
        site::rewrite_path_prefix(&config.output_dir, &prefix)?;
        progress.phase_done();
    }

    let site_path = std::path::absolute(&config.output_dir)
        .map_err(|e| ArchDocsError::io(&config.output_dir, e))?;

    let result = RunResult {
        site_path,
        entity_count,
        page_count,
        enriched,
        warnings,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        site_path = %result.site_path.display(),
        entity_count = result.entity_count,
        page_count = result.page_count,
        enriched = result.enriched,
        elapsed_ms = result.elapsed.as_millis(),
        "run pipeline complete"
    );

    Ok(result)
}

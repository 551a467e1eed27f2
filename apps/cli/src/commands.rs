//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use archdocs_core::pipeline;
use archdocs_shared::{AnalysisBundle, AnalysisKind, AppConfig, load_config};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;

use crate::actions::{self, env_var};
use crate::settings;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// archdocs: architecture documentation sites from code analysis.
#[derive(Parser)]
#[command(
    name = "archdocs",
    version,
    about = "Analyze a repository and publish its architecture as a static documentation site.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to <workspace>/archdocs.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze the workspace and build the documentation site.
    Run(RunArgs),

    /// Enrich an existing document tree with saved analysis results.
    Enrich {
        /// Directory of generated entity documents.
        #[arg(long)]
        content: PathBuf,

        /// Impact analysis JSON.
        #[arg(long)]
        impact: Option<PathBuf>,

        /// Test coverage JSON.
        #[arg(long)]
        coverage: Option<PathBuf>,

        /// Circular dependency JSON.
        #[arg(long)]
        cycles: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for `run`; unset values fall back to action inputs and the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Analysis API key (action input `supermodel-api-key`).
    #[arg(long)]
    pub api_key: Option<String>,

    /// Site title.
    #[arg(long)]
    pub site_name: Option<String>,

    /// Public base URL of the site.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output directory for the built site.
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Site builder templates directory.
    #[arg(long)]
    pub templates_dir: Option<String>,

    /// Repository root to analyze (defaults to $GITHUB_WORKSPACE or `.`).
    #[arg(long)]
    pub workspace: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "archdocs=info",
        1 => "archdocs=debug",
        _ => "archdocs=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => cmd_run(&args, config_path.as_deref()).await,
        Command::Enrich {
            content,
            impact,
            coverage,
            cycles,
        } => cmd_enrich(
            &content,
            impact.as_deref(),
            coverage.as_deref(),
            cycles.as_deref(),
        ),
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: &RunArgs, config_path: Option<&Path>) -> Result<()> {
    let workspace = settings::workspace(args, env_var);
    let config = load_config(&workspace, config_path)?;
    let run_config = settings::resolve(args, &config, workspace, env_var)?;

    let reporter = actions::reporter();
    reporter.phase("Configuration");
    reporter.detail(&format!("Site name: {}", run_config.site_name));
    reporter.detail(&format!("Base URL: {}", run_config.base_url));
    reporter.detail(&format!("Output dir: {}", run_config.output_dir.display()));
    reporter.detail(&format!(
        "Repo: {}",
        run_config.repo.as_ref().map_or("", |r| r.url.as_str())
    ));
    reporter.detail(&format!("Workspace: {}", run_config.workspace.display()));
    reporter.phase_done();

    info!(config = ?run_config, "resolved run configuration");

    let result = pipeline::run(&run_config, reporter.as_ref()).await?;

    let site_path = result.site_path.display().to_string();
    let entity_count = result.entity_count.to_string();
    let page_count = result.page_count.to_string();
    actions::set_output("site-path", &site_path);
    actions::set_output("entity-count", &entity_count);
    actions::set_output("page-count", &page_count);

    println!();
    println!("  site-path={site_path}");
    println!("  entity-count={entity_count}");
    println!("  page-count={page_count}");
    println!("  enriched={}", result.enriched);
    println!("  Time: {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_enrich(
    content: &Path,
    impact: Option<&Path>,
    coverage: Option<&Path>,
    cycles: Option<&Path>,
) -> Result<()> {
    if !content.is_dir() {
        return Err(eyre!("content directory '{}' does not exist", content.display()));
    }

    let mut payloads = HashMap::new();
    for (kind, file) in [
        (AnalysisKind::Impact, impact),
        (AnalysisKind::TestCoverage, coverage),
        (AnalysisKind::CircularDeps, cycles),
    ] {
        if let Some(file) = file {
            let text = std::fs::read_to_string(file)
                .wrap_err_with(|| format!("failed to read {kind} results from {}", file.display()))?;
            payloads.insert(kind, text);
        }
    }

    if payloads.is_empty() {
        return Err(eyre!(
            "nothing to enrich with: pass --impact, --coverage or --cycles"
        ));
    }

    let bundle = AnalysisBundle::enrichment_only(payloads);
    let summary = archdocs_core::enrich(content, &bundle)?;

    println!(
        "Enriched {} of {} entity files ({} without front matter)",
        summary.enriched, summary.scanned, summary.skipped
    );
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let workspace = env_var("GITHUB_WORKSPACE").map_or_else(|| PathBuf::from("."), PathBuf::from);
    let config: AppConfig = load_config(&workspace, config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

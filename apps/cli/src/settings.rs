//! Resolve flags, action inputs, environment and config file into a [`RunConfig`].
//!
//! Precedence per setting: CLI flag, then action input, then `archdocs.toml`,
//! then the derived default.

use std::path::PathBuf;

use archdocs_core::RunConfig;
use archdocs_core::pipeline::{RepoInfo, default_base_url, default_site_name};
use archdocs_shared::{AppConfig, PollPolicy, Result, api_key_from_env, resolve_against};

use crate::actions::input_from;
use crate::commands::RunArgs;

const DEFAULT_OUTPUT_DIR: &str = "./arch-docs-output";

/// Workspace root: `--workspace`, else `GITHUB_WORKSPACE`, else the current directory.
pub(crate) fn workspace<F>(args: &RunArgs, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    args.workspace
        .clone()
        .or_else(|| lookup("GITHUB_WORKSPACE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Build the run configuration for `workspace`.
pub(crate) fn resolve<F>(
    args: &RunArgs,
    config: &AppConfig,
    workspace: PathBuf,
    lookup: F,
) -> Result<RunConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let input = |name: &str| input_from(name, &lookup);
    let pick = |flag: &Option<String>, name: &str, file: &Option<String>| {
        flag.clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| input(name))
            .or_else(|| file.clone())
    };

    let credential = match pick(&args.api_key, "supermodel-api-key", &None) {
        Some(key) => key,
        None => api_key_from_env(config)?,
    };

    let repo = lookup("GITHUB_REPOSITORY").and_then(|slug| RepoInfo::from_slug(&slug));

    let site_name = pick(&args.site_name, "site-name", &config.site.name)
        .unwrap_or_else(|| default_site_name(repo.as_ref()));
    let base_url = pick(&args.base_url, "base-url", &config.site.base_url)
        .unwrap_or_else(|| default_base_url(repo.as_ref()));
    let output_dir = pick(&args.output_dir, "output-dir", &config.site.output_dir)
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
    let templates_dir = pick(&args.templates_dir, "templates-dir", &config.site.templates_dir);

    Ok(RunConfig {
        output_dir: resolve_against(&workspace, output_dir),
        templates_dir: templates_dir.map(PathBuf::from),
        workspace,
        credential,
        endpoints: config.endpoint_configs()?,
        policy: PollPolicy::from(config),
        archive: config.archive.clone(),
        site_name,
        base_url,
        repo,
        generator: config.site.generator.clone(),
        builder: config.site.builder.clone(),
    })
}

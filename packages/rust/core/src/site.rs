//! Steps around the external document generator and site builder.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ignore::WalkBuilder;
use regex::{Captures, Regex};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use url::Url;

use archdocs_shared::{ArchDocsError, Result, resolve_against};

/// Templates location inside the published container image.
const BUNDLED_TEMPLATES: &str = "/app/templates";

const PSSG_TEMPLATE: &str = include_str!("../templates/pssg.yaml");

// ---------------------------------------------------------------------------
// Site builder configuration
// ---------------------------------------------------------------------------

/// Values substituted into `pssg.yaml`.
#[derive(Debug, Clone)]
pub struct SiteParams<'a> {
    pub site_name: &'a str,
    pub base_url: &'a str,
    pub repo_url: &'a str,
    pub repo_name: &'a str,
    pub content_dir: &'a Path,
    pub templates_dir: &'a Path,
    pub output_dir: &'a Path,
    pub source_dir: &'a Path,
}

/// Render the bundled `pssg.yaml` template.
pub fn render_pssg_config(params: &SiteParams<'_>) -> String {
    let path = |p: &Path| p.display().to_string();
    [
        ("site_name", params.site_name.to_string()),
        ("base_url", params.base_url.to_string()),
        ("repo_url", params.repo_url.to_string()),
        ("repo_name", params.repo_name.to_string()),
        ("content_dir", path(params.content_dir)),
        ("templates_dir", path(params.templates_dir)),
        ("output_dir", path(params.output_dir)),
        ("source_dir", path(params.source_dir)),
    ]
    .iter()
    .fold(PSSG_TEMPLATE.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), &yaml_escape(value))
    })
}

pub fn write_pssg_config(path: &Path, params: &SiteParams<'_>) -> Result<()> {
    std::fs::write(path, render_pssg_config(params)).map_err(|e| ArchDocsError::io(path, e))?;
    debug!(path = %path.display(), "site builder config written");
    Ok(())
}

/// Escape for a double-quoted YAML scalar.
fn yaml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Pick the templates directory.
///
/// An explicit directory (relative ones resolve against the workspace) wins;
/// otherwise the first existing of `/app/templates` and `<exe dir>/templates`,
/// falling back to `templates`.
pub fn resolve_templates_dir(explicit: Option<&Path>, workspace: &Path) -> PathBuf {
    if let Some(dir) = explicit {
        return resolve_against(workspace, dir);
    }

    let bundled = PathBuf::from(BUNDLED_TEMPLATES);
    if bundled.exists() {
        return bundled;
    }

    if let Some(beside_exe) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("templates")))
        .filter(|dir| dir.exists())
    {
        return beside_exe;
    }

    PathBuf::from("templates")
}

// ---------------------------------------------------------------------------
// External tools
// ---------------------------------------------------------------------------

/// Run `program` with inherited stdout/stderr and fail on a non-zero exit.
#[instrument(skip_all, fields(program = %program))]
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let rendered: Vec<_> = args.iter().map(|a| a.as_ref().to_string_lossy()).collect();
    info!("running: {program} {}", rendered.join(" "));

    let status = Command::new(program)
        .args(&args)
        .status()
        .await
        .map_err(|e| ArchDocsError::Command {
            program: program.to_string(),
            message: format!("failed to start: {e}. Is `{program}` installed?"),
        })?;

    if !status.success() {
        return Err(ArchDocsError::Command {
            program: program.to_string(),
            message: format!("exited with {status}"),
        });
    }
    Ok(())
}

/// Run the generator on `graph`. Returns the number of `.md` files produced.
pub async fn generate_docs(
    generator: &str,
    graph: &Path,
    content_dir: &Path,
    repo_name: Option<&str>,
    repo_url: Option<&str>,
) -> Result<usize> {
    std::fs::create_dir_all(content_dir).map_err(|e| ArchDocsError::io(content_dir, e))?;

    let mut args = vec![
        "-input".to_string(),
        graph.display().to_string(),
        "-output".to_string(),
        content_dir.display().to_string(),
    ];
    if let Some(name) = repo_name {
        args.extend(["-repo".to_string(), name.to_string()]);
    }
    if let Some(url) = repo_url {
        args.extend(["-repo-url".to_string(), url.to_string()]);
    }

    run_tool(generator, &args).await?;
    Ok(count_files(content_dir, "md"))
}

/// Run `<builder> build --config <config>`. Returns the number of `.html` pages in `output_dir`.
pub async fn build_site(builder: &str, config: &Path, output_dir: &Path) -> Result<usize> {
    let config = config.display().to_string();
    run_tool(builder, ["build", "--config", config.as_str()]).await?;
    Ok(count_files(output_dir, "html"))
}

/// Count files below `dir` with extension `ext` (no dot, case-sensitive).
pub fn count_files(dir: &Path, ext: &str) -> usize {
    WalkBuilder::new(dir)
        .standard_filters(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter(|entry| entry.path().extension().is_some_and(|e| e == ext))
        .count()
}

// ---------------------------------------------------------------------------
// Subdirectory deployment
// ---------------------------------------------------------------------------

/// Path component of `base_url` without trailing slashes, if there is one.
pub fn path_prefix(base_url: &str) -> Option<String> {
    let url = Url::parse(base_url).ok()?;
    let prefix = url.path().trim_end_matches('/');
    (!prefix.is_empty()).then(|| prefix.to_string())
}

static ROOT_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(href="|src="|fetch\(")/|(window\.location\.href = ")/""#)
        .expect("valid regex")
});

/// Prefix root-relative references in one HTML or JS document.
///
/// Protocol-relative `//host` references are left alone.
pub fn rewrite_references(content: &str, prefix: &str) -> String {
    ROOT_RELATIVE
        .replace_all(content, |caps: &Captures<'_>| {
            let whole = &caps[0];
            if let Some(attr) = caps.get(1) {
                let end = caps.get(0).map_or(0, |m| m.end());
                if content[end..].starts_with('/') {
                    return whole.to_string();
                }
                format!("{}{prefix}/", attr.as_str())
            } else {
                format!("{}{prefix}/\"", &caps[2])
            }
        })
        .into_owned()
}

/// Rewrite every `.html`/`.js` file under `dir`. Returns the number of files changed.
#[instrument(skip_all, fields(dir = %dir.display(), prefix = %prefix))]
pub fn rewrite_path_prefix(dir: &Path, prefix: &str) -> Result<usize> {
    let mut changed = 0;

    for entry in WalkBuilder::new(dir).standard_filters(false).build() {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let is_asset = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| e == "html" || e == "js");
        if !entry.file_type().is_some_and(|t| t.is_file()) || !is_asset {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let rewritten = rewrite_references(&content, prefix);
        if rewritten != content {
            std::fs::write(path, rewritten).map_err(|e| ArchDocsError::io(path, e))?;
            changed += 1;
        }
    }

    info!(changed, "path prefix applied");
    Ok(changed)
}

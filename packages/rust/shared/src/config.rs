//! Application configuration for archdocs.
//!
//! An optional `archdocs.toml` lives at the workspace root (or is passed with
//! `--config`). CLI flags and action inputs override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ArchDocsError, Result};
use crate::types::{AnalysisKind, EndpointConfig};

/// Default configuration file name, looked up at the workspace root.
pub const CONFIG_FILE_NAME: &str = "archdocs.toml";

/// Hard cap on concurrently configured endpoints (one per analysis kind).
const MAX_ENDPOINTS: usize = AnalysisKind::ALL.len();

// ---------------------------------------------------------------------------
// Config structs (matching archdocs.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Analysis API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Job polling policy.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Workspace archive filters.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Site output defaults.
    #[serde(default)]
    pub site: SiteConfig,

    /// Analysis endpoints to submit the workspace to.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            archive: ArchiveConfig::default(),
            site: SiteConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL that relative endpoint paths are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.supermodeltools.com".into()
}
fn default_api_key_env() -> String {
    "SUPERMODEL_API_KEY".into()
}

/// `[polling]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Per-job deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Poll interval used when the service sends no usable `Retry-After`.
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Upper bound applied to `Retry-After`.
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Timeout for a single HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_interval_secs: default_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15 * 60
}
fn default_interval_secs() -> u64 {
    10
}
fn default_max_interval_secs() -> u64 {
    120
}
fn default_request_timeout_secs() -> u64 {
    5 * 60
}

/// `[archive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Files larger than this many bytes are left out of the archive.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Directory names that are never descended into.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            skip_dirs: default_skip_dirs(),
        }
    }
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}
fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        "node_modules",
        ".next",
        "dist",
        "build",
        "vendor",
        "__pycache__",
        ".venv",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title. Derived from the repository name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Public base URL. Derived from the repository when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Output directory for the built site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Site builder templates directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<String>,

    /// Program that turns the dependency graph into entity documents.
    #[serde(default = "default_generator")]
    pub generator: String,

    /// Program that builds the static site from the document tree.
    #[serde(default = "default_builder")]
    pub builder: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: None,
            base_url: None,
            output_dir: None,
            templates_dir: None,
            generator: default_generator(),
            builder: default_builder(),
        }
    }
}

fn default_generator() -> String {
    "graph2md".into()
}
fn default_builder() -> String {
    "pssg".into()
}

/// `[[endpoints]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEntry {
    /// Analysis produced by this endpoint.
    pub kind: AnalysisKind,
    /// Path relative to `api.base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Absolute URL; takes precedence over `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whether a failure of this endpoint aborts the run.
    #[serde(default)]
    pub required: bool,
}

fn default_endpoints() -> Vec<EndpointEntry> {
    let entry = |kind, path: &str, required| EndpointEntry {
        kind,
        path: Some(path.into()),
        url: None,
        required,
    };
    vec![
        entry(AnalysisKind::Graph, "/v1/graphs/supermodel", true),
        entry(AnalysisKind::Impact, "/v1/analysis/impact", false),
        entry(
            AnalysisKind::TestCoverage,
            "/v1/analysis/test-coverage-map",
            false,
        ),
        entry(
            AnalysisKind::CircularDeps,
            "/v1/analysis/circular-dependencies",
            false,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Poll policy (runtime, derived from config)
// ---------------------------------------------------------------------------

/// Runtime polling policy handed to every job client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Per-job deadline, measured from submission.
    pub timeout: Duration,
    /// Interval used when `Retry-After` is absent or invalid.
    pub default_interval: Duration,
    /// Upper bound for `Retry-After`.
    pub max_interval: Duration,
    /// Timeout for one HTTP request.
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            default_interval: Duration::from_secs(config.default_interval_secs),
            max_interval: Duration::from_secs(config.max_interval_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl From<&AppConfig> for PollPolicy {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.polling)
    }
}

// ---------------------------------------------------------------------------
// Endpoint resolution
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Resolve `[[endpoints]]` into validated [`EndpointConfig`]s.
    pub fn endpoint_configs(&self) -> Result<Vec<EndpointConfig>> {
        let base = Url::parse(&self.api.base_url).map_err(|e| {
            ArchDocsError::config(format!("invalid api.base_url '{}': {e}", self.api.base_url))
        })?;

        let endpoints = self
            .endpoints
            .iter()
            .map(|entry| {
                let url = match (&entry.url, &entry.path) {
                    (Some(url), _) => Url::parse(url).map_err(|e| {
                        ArchDocsError::config(format!("invalid url for {}: {e}", entry.kind))
                    })?,
                    (None, Some(path)) => base.join(path).map_err(|e| {
                        ArchDocsError::config(format!("invalid path for {}: {e}", entry.kind))
                    })?,
                    (None, None) => {
                        return Err(ArchDocsError::config(format!(
                            "endpoint {} needs either `url` or `path`",
                            entry.kind
                        )));
                    }
                };
                Ok(EndpointConfig::new(entry.kind, url, entry.required))
            })
            .collect::<Result<Vec<_>>>()?;

        validate_endpoints(&endpoints)?;
        Ok(endpoints)
    }
}

/// Check the required/optional partition of an endpoint set.
///
/// Exactly one endpoint is required and it must produce the dependency graph;
/// each analysis kind appears at most once.
pub fn validate_endpoints(endpoints: &[EndpointConfig]) -> Result<()> {
    if endpoints.len() > MAX_ENDPOINTS {
        return Err(ArchDocsError::validation(format!(
            "{} endpoints configured, at most {MAX_ENDPOINTS} are supported",
            endpoints.len()
        )));
    }

    for (i, ep) in endpoints.iter().enumerate() {
        if endpoints[..i].iter().any(|other| other.kind == ep.kind) {
            return Err(ArchDocsError::validation(format!(
                "endpoint kind {} configured more than once",
                ep.kind
            )));
        }
    }

    let required: Vec<_> = endpoints.iter().filter(|ep| ep.required).collect();
    match required.as_slice() {
        [only] if only.kind == AnalysisKind::Graph => Ok(()),
        [only] => Err(ArchDocsError::validation(format!(
            "the required endpoint must be the graph endpoint, got {}",
            only.kind
        ))),
        [] => Err(ArchDocsError::validation(
            "no required endpoint configured; the graph endpoint must be required",
        )),
        _ => Err(ArchDocsError::validation(format!(
            "{} required endpoints configured, exactly one is allowed",
            required.len()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load config: an explicit path must exist; otherwise `<workspace>/archdocs.toml`
/// is used when present, falling back to defaults.
pub fn load_config(workspace: &Path, explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = workspace.join(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArchDocsError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArchDocsError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Read the API key from the env var named in `[api]`.
pub fn api_key_from_env(config: &AppConfig) -> Result<String> {
    let var_name = &config.api.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(ArchDocsError::config(format!(
            "API key not found. Pass --api-key, set the `supermodel-api-key` action input, \
             or set the {var_name} environment variable."
        ))),
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

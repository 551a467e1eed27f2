//! Shared types, error model, and configuration for archdocs.
//!
//! This crate is the foundation depended on by all other archdocs crates.
//! It provides:
//! - [`ArchDocsError`]: the unified error type
//! - Domain types ([`AnalysisKind`], [`AnalysisBundle`], [`EndpointConfig`])
//! - Configuration ([`AppConfig`], [`PollPolicy`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, ArchiveConfig, CONFIG_FILE_NAME, EndpointEntry, PollPolicy,
    PollingConfig, SiteConfig, api_key_from_env, load_config, load_config_from, resolve_against,
    validate_endpoints,
};
pub use error::{ArchDocsError, Result};
pub use types::{AnalysisBundle, AnalysisKind, EndpointConfig};

//! Orchestration and document processing for archdocs.
//!
//! This crate ties the analysis client, result models and document format
//! together into the end-to-end `run` pipeline: workspace archive, concurrent
//! endpoint fan-out, entity document enrichment and the site build steps.

pub mod archive;
pub mod enrichment;
pub mod orchestrator;
pub mod pipeline;
pub mod site;

pub use enrichment::{Enricher, EnrichmentSummary, enrich};
pub use orchestrator::{EndpointWarning, Orchestration, Orchestrator};
pub use pipeline::{ProgressReporter, RepoInfo, RunConfig, RunResult, SilentProgress};

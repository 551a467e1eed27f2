//! Concurrent fan-out of analysis jobs, one per configured endpoint.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use archdocs_client::{JobClient, Payload};
use archdocs_shared::{
    AnalysisBundle, AnalysisKind, ArchDocsError, EndpointConfig, PollPolicy, Result,
    validate_endpoints,
};

/// An optional endpoint that failed; its slot in the bundle stays empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointWarning {
    pub kind: AnalysisKind,
    pub message: String,
}

impl fmt::Display for EndpointWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} endpoint failed: {}", self.kind, self.message)
    }
}

/// Everything a finished fan-out produced.
#[derive(Debug)]
pub struct Orchestration {
    pub bundle: AnalysisBundle,
    pub warnings: Vec<EndpointWarning>,
}

/// Runs one job per endpoint and sorts the outcomes into required and optional.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: JobClient,
    endpoints: Vec<EndpointConfig>,
}

impl Orchestrator {
    /// Fails unless exactly one graph endpoint is required and no kind repeats.
    pub fn new(endpoints: Vec<EndpointConfig>, policy: PollPolicy) -> Result<Self> {
        validate_endpoints(&endpoints)?;
        Ok(Self {
            client: JobClient::new(policy)?,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &[EndpointConfig] {
        &self.endpoints
    }

    /// Submit `payload` to every endpoint concurrently and wait for all of them.
    ///
    /// A failed required endpoint fails the run; failed optional endpoints
    /// become warnings.
    #[instrument(skip_all, fields(endpoints = self.endpoints.len()))]
    pub async fn run(&self, credential: &str, payload: Arc<Payload>) -> Result<Orchestration> {
        let credential: Arc<str> = Arc::from(credential);
        let mut tasks = JoinSet::new();

        for endpoint in &self.endpoints {
            let client = self.client.clone();
            let endpoint = endpoint.clone();
            let credential = Arc::clone(&credential);
            let payload = Arc::clone(&payload);

            tasks.spawn(async move {
                let token = Uuid::new_v4();
                let deadline = Instant::now() + client.policy().timeout;
                let outcome = client
                    .run(&endpoint, &credential, &payload, token, deadline)
                    .await;
                (endpoint, outcome)
            });
        }

        let mut payloads = HashMap::new();
        let mut required_failure = None;
        let mut warnings = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (endpoint, outcome) = joined.map_err(|e| {
                ArchDocsError::validation(format!("analysis task did not finish: {e}"))
            })?;

            match outcome {
                Ok(result) => {
                    info!(endpoint = %endpoint.kind, bytes = result.len(), "analysis received");
                    payloads.insert(endpoint.kind, result);
                }
                Err(e) if endpoint.required => {
                    error!(endpoint = %endpoint.kind, error = %e, "required analysis failed");
                    required_failure = Some(e);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint.kind, error = %e, "optional analysis failed");
                    warnings.push(EndpointWarning {
                        kind: endpoint.kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(e) = required_failure {
            return Err(e);
        }

        warnings.sort_by_key(|w| w.kind);
        Ok(Orchestration {
            bundle: AnalysisBundle::from_payloads(payloads)?,
            warnings,
        })
    }
}

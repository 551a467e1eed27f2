//! Submit-then-poll client for the asynchronous analysis services.
//!
//! Every request re-uploads the same payload with the same `Idempotency-Key`;
//! the service answers with a status envelope until the job is `completed`
//! or `failed`. Polling is paced by `Retry-After` and bounded by a deadline
//! that also caps each in-flight request.

mod envelope;
mod job;

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use archdocs_shared::{ArchDocsError, EndpointConfig, PollPolicy, Result};

pub use envelope::{Envelope, poll_interval};
pub use job::{Job, JobStatus};

/// User-Agent string for analysis requests.
const USER_AGENT: &str = concat!("archdocs/", env!("CARGO_PKG_VERSION"));

const API_KEY_HEADER: &str = "X-Api-Key";
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const ZIP_MIME: &str = "application/zip";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The archive uploaded with every request of a job.
///
/// Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct Payload {
    file_name: String,
    bytes: Bytes,
}

impl Payload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read the archive at `path` into memory.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ArchDocsError::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo.zip".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// JobClient
// ---------------------------------------------------------------------------

/// One parsed reply plus the wait it asks for.
struct Reply {
    envelope: Envelope,
    interval: std::time::Duration,
}

/// Runs submit/poll cycles against analysis endpoints.
///
/// Holds no per-job state; one client can drive many jobs concurrently.
#[derive(Debug, Clone)]
pub struct JobClient {
    http: Client,
    policy: PollPolicy,
}

impl JobClient {
    pub fn new(policy: PollPolicy) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.request_timeout)
            .build()
            .map_err(|e| ArchDocsError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, policy })
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Run a job with a fresh token and a deadline of `policy.timeout` from now.
    pub async fn submit(
        &self,
        endpoint: &EndpointConfig,
        credential: &str,
        payload: &Payload,
    ) -> Result<String> {
        let deadline = Instant::now() + self.policy.timeout;
        self.run(endpoint, credential, payload, Uuid::new_v4(), deadline)
            .await
    }

    /// Submit `payload` and poll until the job completes, fails, or `deadline` passes.
    ///
    /// Returns the raw JSON text of the envelope's `result`. A transport error
    /// or unparseable body on the first request is terminal; transport errors
    /// while polling are logged and retried.
    #[instrument(skip_all, fields(endpoint = %endpoint.kind, token = %token))]
    pub async fn run(
        &self,
        endpoint: &EndpointConfig,
        credential: &str,
        payload: &Payload,
        token: Uuid,
        deadline: Instant,
    ) -> Result<String> {
        let mut job = Job::new(
            endpoint.kind.as_str(),
            token,
            deadline,
            self.policy.default_interval,
        );

        info!(url = %endpoint.url, bytes = payload.len(), "submitting analysis job");
        let reply = self.exchange(&job, endpoint, credential, payload).await?;
        if let Some(result) = observe(&mut job, reply)? {
            return Ok(result);
        }

        loop {
            let interval = job.interval_hint();
            info!(
                status = %job.status(),
                job_id = job.service_id().unwrap_or("-"),
                interval_secs = interval.as_secs(),
                "job pending, polling again"
            );

            sleep_until((Instant::now() + interval).min(job.deadline())).await;
            if job.is_expired() {
                return Err(job.timeout_error());
            }

            match self.exchange(&job, endpoint, credential, payload).await {
                Ok(reply) => {
                    if let Some(result) = observe(&mut job, reply)? {
                        return Ok(result);
                    }
                }
                Err(ArchDocsError::Network(message)) => {
                    warn!(error = %message, "poll request failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request/response round trip, bounded by the job deadline.
    async fn exchange(
        &self,
        job: &Job,
        endpoint: &EndpointConfig,
        credential: &str,
        payload: &Payload,
    ) -> Result<Reply> {
        let body = Body::from(payload.bytes.clone());
        let part = Part::stream_with_length(body, payload.len() as u64)
            .file_name(payload.file_name.clone())
            .mime_str(ZIP_MIME)
            .map_err(|e| ArchDocsError::validation(format!("invalid upload part: {e}")))?;

        let request = self
            .http
            .post(endpoint.url.clone())
            .header(API_KEY_HEADER, credential)
            .header(IDEMPOTENCY_HEADER, job.token().to_string())
            .multipart(Form::new().part("file", part));

        let url = &endpoint.url;
        let round_trip = async {
            let response = request
                .send()
                .await
                .map_err(|e| ArchDocsError::Network(format!("{url}: {e}")))?;

            let status = response.status();
            let interval = envelope::poll_interval_from(response.headers(), &self.policy);
            let body = response.bytes().await.map_err(|e| {
                ArchDocsError::Network(format!("{url}: failed to read body: {e}"))
            })?;

            if status.as_u16() >= 400 {
                return Err(ArchDocsError::Network(format!(
                    "{url}: HTTP {status}: {}",
                    String::from_utf8_lossy(&body)
                )));
            }

            debug!(%status, bytes = body.len(), "received envelope");
            Ok(Reply {
                envelope: Envelope::parse(&body)?,
                interval,
            })
        };

        timeout_at(job.deadline(), round_trip)
            .await
            .map_err(|_| job.timeout_error())?
    }
}

/// Apply a reply to the job. `Some` carries the result of a completed job.
fn observe(job: &mut Job, reply: Reply) -> Result<Option<String>> {
    let Reply { envelope, interval } = reply;
    job.record_service_id(envelope.job_id.clone());
    job.set_interval_hint(interval);

    let status = JobStatus::from_wire(&envelope.status);
    job.advance(status)?;

    match status {
        JobStatus::Completed => match envelope.result_text() {
            Some(result) => {
                info!(elapsed_secs = job.elapsed().as_secs(), "analysis job completed");
                Ok(Some(result.to_string()))
            }
            None => Err(ArchDocsError::parse(format!(
                "{} job completed without a result",
                job.endpoint()
            ))),
        },
        JobStatus::Failed => Err(ArchDocsError::JobFailed {
            endpoint: job.endpoint().to_string(),
            message: envelope.error_text().to_string(),
        }),
        JobStatus::Submitted | JobStatus::Running => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use archdocs_shared::AnalysisKind;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const GRAPH_PATH: &str = "/v1/graphs/supermodel";

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_secs(5),
            default_interval: Duration::from_millis(20),
            max_interval: Duration::from_secs(120),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn endpoint(server: &MockServer) -> EndpointConfig {
        let url = Url::parse(&format!("{}{GRAPH_PATH}", server.uri())).unwrap();
        EndpointConfig::new(AnalysisKind::Graph, url, true)
    }

    fn payload() -> Payload {
        Payload::new("repo.zip", b"PK\x03\x04zipdata".to_vec())
    }

    fn pending() -> ResponseTemplate {
        ResponseTemplate::new(202).set_body_json(json!({"status": "pending", "jobId": "job-1"}))
    }

    fn completed() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "jobId": "job-1",
            "result": {"nodes": [{"id": "a"}]}
        }))
    }

    async fn mount_once(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(GRAPH_PATH))
            .respond_with(response)
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    async fn mount_always(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(GRAPH_PATH))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn tokens(requests: &[wiremock::Request]) -> HashSet<String> {
        requests
            .iter()
            .map(|r| {
                r.headers
                    .get(IDEMPOTENCY_HEADER)
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn immediate_completion_returns_raw_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GRAPH_PATH))
            .and(header(API_KEY_HEADER, "secret"))
            .respond_with(completed())
            .mount(&server)
            .await;

        let client = JobClient::new(fast_policy()).unwrap();
        let result = client
            .submit(&endpoint(&server), "secret", &payload())
            .await
            .unwrap();
        assert_eq!(result, r#"{"nodes": [{"id": "a"}]}"#);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains(r#"name="file""#));
        assert!(body.contains("application/zip"));
    }

    #[tokio::test]
    async fn token_is_stable_across_polls() {
        let server = MockServer::start().await;
        mount_once(&server, pending()).await;
        mount_once(&server, pending()).await;
        mount_always(&server, completed()).await;

        let client = JobClient::new(fast_policy()).unwrap();
        let token = Uuid::new_v4();
        let deadline = Instant::now() + Duration::from_secs(5);
        client
            .run(&endpoint(&server), "secret", &payload(), token, deadline)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(tokens(&requests), HashSet::from([token.to_string()]));
    }

    #[tokio::test]
    async fn failed_status_is_terminal() {
        let server = MockServer::start().await;
        mount_once(&server, pending()).await;
        mount_always(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "failed", "error": {"code": "too_large"}})),
        )
        .await;

        let client = JobClient::new(fast_policy()).unwrap();
        let err = client
            .submit(&endpoint(&server), "secret", &payload())
            .await
            .unwrap_err();

        match err {
            ArchDocsError::JobFailed { endpoint, message } => {
                assert_eq!(endpoint, "graph");
                assert!(message.contains("too_large"));
            }
            other => panic!("expected JobFailed, got {other:?}"),
        }
        // Not retried after the failure.
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transient_poll_errors_are_retried() {
        let server = MockServer::start().await;
        mount_once(&server, pending()).await;
        mount_once(&server, ResponseTemplate::new(503).set_body_string("busy")).await;
        mount_always(&server, completed()).await;

        let client = JobClient::new(fast_policy()).unwrap();
        let result = client
            .submit(&endpoint(&server), "secret", &payload())
            .await
            .unwrap();
        assert!(result.contains("nodes"));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(tokens(&requests).len(), 1);
    }

    #[tokio::test]
    async fn initial_transport_error_is_terminal() {
        let server = MockServer::start().await;
        mount_once(&server, ResponseTemplate::new(503)).await;
        mount_always(&server, completed()).await;

        let client = JobClient::new(fast_policy()).unwrap();
        let err = client
            .submit(&endpoint(&server), "secret", &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchDocsError::Network(ref m) if m.contains("503")));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_poll_response_is_terminal() {
        let server = MockServer::start().await;
        mount_once(&server, pending()).await;
        mount_once(&server, ResponseTemplate::new(200).set_body_string("not json")).await;
        mount_always(&server, completed()).await;

        let client = JobClient::new(fast_policy()).unwrap();
        let err = client
            .submit(&endpoint(&server), "secret", &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchDocsError::Parse { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn never_completing_job_times_out() {
        let server = MockServer::start().await;
        mount_always(&server, pending()).await;

        let client = JobClient::new(fast_policy()).unwrap();
        let started = Instant::now();
        let deadline = started + Duration::from_millis(300);
        let err = client
            .run(&endpoint(&server), "secret", &payload(), Uuid::new_v4(), deadline)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(server.received_requests().await.unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn deadline_bounds_in_flight_request() {
        let server = MockServer::start().await;
        mount_always(&server, completed().set_delay(Duration::from_secs(3))).await;

        let client = JobClient::new(fast_policy()).unwrap();
        let started = Instant::now();
        let deadline = started + Duration::from_millis(200);
        let err = client
            .run(&endpoint(&server), "secret", &payload(), Uuid::new_v4(), deadline)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retry_after_paces_polling() {
        let server = MockServer::start().await;
        mount_once(&server, pending().insert_header("Retry-After", "1")).await;
        mount_always(&server, completed()).await;

        // Default interval is 20 ms; the header asks for a full second.
        let client = JobClient::new(fast_policy()).unwrap();
        let started = Instant::now();
        client
            .submit(&endpoint(&server), "secret", &payload())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[test]
    fn cloned_payload_shares_its_buffer() {
        let original = payload();
        let copy = original.clone();
        assert_eq!(original.bytes.as_ptr(), copy.bytes.as_ptr());
        assert_eq!(copy.len(), 11);
    }

    #[tokio::test]
    async fn payload_from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("repo-123.zip");
        std::fs::write(&zip, b"PK").unwrap();

        let payload = Payload::from_path(&zip).await.unwrap();
        assert_eq!(payload.file_name(), "repo-123.zip");
        assert_eq!(payload.len(), 2);

        let missing = Payload::from_path(&dir.path().join("nope.zip")).await;
        assert!(matches!(missing, Err(ArchDocsError::Io { .. })));
    }
}

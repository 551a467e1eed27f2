//! Lifecycle of one submission against one endpoint.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use archdocs_shared::{ArchDocsError, Result};

/// Where a job is in its submit/poll lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Request sent, no status seen yet.
    Submitted,
    /// The service reported a non-terminal status (`queued`, `running`, ...).
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Map an envelope `status` string. Unknown values are non-terminal.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// One submission lifecycle.
///
/// The idempotency token is fixed at construction and the status never
/// leaves a terminal state.
#[derive(Debug)]
pub struct Job {
    endpoint: String,
    token: Uuid,
    status: JobStatus,
    service_id: Option<String>,
    interval_hint: Duration,
    started: Instant,
    deadline: Instant,
}

impl Job {
    pub fn new(
        endpoint: impl Into<String>,
        token: Uuid,
        deadline: Instant,
        default_interval: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            status: JobStatus::Submitted,
            service_id: None,
            interval_hint: default_interval,
            started: Instant::now(),
            deadline,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Job id assigned by the service, once one has been seen.
    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn interval_hint(&self) -> Duration {
        self.interval_hint
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Move to `next`. Fails once the job is terminal.
    pub fn advance(&mut self, next: JobStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(ArchDocsError::validation(format!(
                "{} job is already {}, cannot move to {next}",
                self.endpoint, self.status
            )));
        }
        if next == JobStatus::Submitted {
            return Err(ArchDocsError::validation(format!(
                "{} job cannot return to {next}",
                self.endpoint
            )));
        }
        self.status = next;
        Ok(())
    }

    pub(crate) fn record_service_id(&mut self, id: Option<String>) {
        if id.is_some() {
            self.service_id = id;
        }
    }

    pub(crate) fn set_interval_hint(&mut self, interval: Duration) {
        self.interval_hint = interval;
    }

    pub(crate) fn timeout_error(&self) -> ArchDocsError {
        ArchDocsError::Timeout {
            endpoint: self.endpoint.clone(),
            elapsed: self.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            "graph",
            Uuid::new_v4(),
            Instant::now() + Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn running_may_repeat() {
        let mut job = job();
        assert_eq!(job.status(), JobStatus::Submitted);
        job.advance(JobStatus::Running).unwrap();
        job.advance(JobStatus::Running).unwrap();
        job.advance(JobStatus::Completed).unwrap();
        assert!(job.status().is_terminal());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = job();
        job.advance(JobStatus::Failed).unwrap();
        assert!(job.advance(JobStatus::Running).is_err());
        assert!(job.advance(JobStatus::Completed).is_err());
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn cannot_return_to_submitted() {
        let mut job = job();
        job.advance(JobStatus::Running).unwrap();
        assert!(job.advance(JobStatus::Submitted).is_err());
    }

    #[test]
    fn token_is_fixed() {
        let mut job = job();
        let token = job.token();
        job.advance(JobStatus::Running).unwrap();
        job.record_service_id(Some("job-1".into()));
        job.record_service_id(None);
        assert_eq!(job.token(), token);
        assert_eq!(job.service_id(), Some("job-1"));
    }

    #[test]
    fn wire_status_mapping() {
        assert_eq!(JobStatus::from_wire("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from_wire("failed"), JobStatus::Failed);
        assert_eq!(JobStatus::from_wire("queued"), JobStatus::Running);
        assert_eq!(JobStatus::from_wire(""), JobStatus::Running);
    }

    #[test]
    fn timeout_error_names_endpoint() {
        let err = job().timeout_error();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("graph"));
    }
}

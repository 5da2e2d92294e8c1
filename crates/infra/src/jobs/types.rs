//! Core job types.

use serde::{Deserialize, Serialize};

type JobFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A deferred unit of work.
///
/// Owned by the queue until dequeued, then exclusively by the worker, which
/// runs it once and drops it whatever the outcome.
pub struct Job {
    name: Option<String>,
    run: JobFn,
}

impl Job {
    /// Create a job from a fallible action. An `Err` is logged by the worker.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: None,
            run: Box::new(f),
        }
    }

    /// Create a job from an action that cannot report failure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(move || {
            f();
            Ok(())
        })
    }

    /// Attach a human-readable name for submission reporting.
    pub fn named(self, name: impl Into<String>) -> NamedJob {
        NamedJob::new(name, self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn run(self) -> anyhow::Result<()> {
        (self.run)()
    }
}

impl core::fmt::Debug for Job {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A job with a name, used when the caller wants a [`SubmissionResult`]
/// instead of an error.
#[derive(Debug)]
pub struct NamedJob {
    name: String,
    job: Job,
}

impl NamedJob {
    pub fn new(name: impl Into<String>, job: Job) -> Self {
        Self {
            name: name.into(),
            job,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into the name and a job that carries the name into worker logs.
    pub fn into_parts(self) -> (String, Job) {
        let mut job = self.job;
        job.name = Some(self.name.clone());
        (self.name, job)
    }
}

/// Outcome of a named submission. Describes the enqueue, not the execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,
    pub message: String,
}

impl SubmissionResult {
    pub fn accepted(name: &str) -> Self {
        Self {
            success: true,
            message: format!("job '{name}' submitted"),
        }
    }

    pub fn rejected(name: &str, reason: impl core::fmt::Display) -> Self {
        Self {
            success: false,
            message: format!("job '{name}' rejected: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn from_fn_runs_action_and_succeeds() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let job = Job::from_fn(move || flag.store(true, Ordering::SeqCst));

        assert!(job.run().is_ok());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn fallible_job_reports_error() {
        let job = Job::new(|| anyhow::bail!("mail server unreachable"));
        let err = job.run().unwrap_err();
        assert_eq!(err.to_string(), "mail server unreachable");
    }

    #[test]
    fn named_job_carries_name_into_job() {
        let (name, job) = Job::from_fn(|| {}).named("send-receipt").into_parts();
        assert_eq!(name, "send-receipt");
        assert_eq!(job.name(), Some("send-receipt"));
    }

    #[test]
    fn submission_result_serializes_as_plain_object() {
        let result = SubmissionResult::rejected("reindex", "queue full");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "job 'reindex' rejected: queue full"})
        );
    }
}

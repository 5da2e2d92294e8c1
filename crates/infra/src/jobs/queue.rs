//! Bounded multi-producer / single-consumer job queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::types::{Job, NamedJob, SubmissionResult};

/// Submission failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobQueueError {
    /// The queue already holds its configured maximum of pending jobs.
    #[error("job queue is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    /// The worker side of the queue has been dropped.
    #[error("job queue is closed")]
    Closed,
}

/// What travels through the channel.
#[derive(Debug)]
pub(crate) enum Envelope {
    Run(Job),
    /// Unblocks a waiting worker so it notices shutdown.
    Wake,
}

/// Producer half of the queue. Cheap to clone and safe to share across
/// request threads.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: SyncSender<Envelope>,
    capacity: usize,
    pending: Arc<AtomicUsize>,
}

/// Consumer half of the queue, handed to exactly one worker.
///
/// Holds no sender of its own: once every [`JobQueue`] clone and the worker
/// handle are gone, the channel disconnects and the worker exits.
#[derive(Debug)]
pub struct JobReceiver {
    receiver: Receiver<Envelope>,
    waker: Option<SyncSender<Envelope>>,
    pending: Arc<AtomicUsize>,
}

/// Create a queue holding at most `capacity` pending jobs (minimum 1).
pub fn bounded(capacity: usize) -> (JobQueue, JobReceiver) {
    let capacity = capacity.max(1);
    let (sender, receiver) = mpsc::sync_channel(capacity);
    let pending = Arc::new(AtomicUsize::new(0));

    let queue = JobQueue {
        sender: sender.clone(),
        capacity,
        pending: pending.clone(),
    };
    let jobs = JobReceiver {
        receiver,
        waker: Some(sender),
        pending,
    };
    (queue, jobs)
}

impl JobQueue {
    /// Enqueue `job` without blocking.
    ///
    /// Fails with [`JobQueueError::CapacityExceeded`] when the queue is full;
    /// the caller decides whether to drop, retry, or surface the error.
    pub fn submit(&self, job: Job) -> Result<(), JobQueueError> {
        // Count before sending so the worker's decrement can never run first.
        self.pending.fetch_add(1, Ordering::SeqCst);

        match self.sender.try_send(Envelope::Run(job)) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                match err {
                    TrySendError::Full(_) => Err(JobQueueError::CapacityExceeded {
                        capacity: self.capacity,
                    }),
                    TrySendError::Disconnected(_) => Err(JobQueueError::Closed),
                }
            }
        }
    }

    /// Enqueue a named job, reporting the outcome instead of failing.
    pub fn submit_named(&self, job: NamedJob) -> SubmissionResult {
        let (name, job) = job.into_parts();
        match self.submit(job) {
            Ok(()) => {
                debug!(job = %name, "job submitted");
                SubmissionResult::accepted(&name)
            }
            Err(err) => {
                debug!(job = %name, error = %err, "job submission rejected");
                SubmissionResult::rejected(&name, err)
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs submitted but not yet picked up.
    ///
    /// Approximate under concurrency: a rejected submission is counted until
    /// its send fails, so this may briefly exceed [`capacity`](Self::capacity).
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl JobReceiver {
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Envelope, RecvTimeoutError> {
        let envelope = self.receiver.recv_timeout(timeout)?;
        if matches!(envelope, Envelope::Run(_)) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(envelope)
    }

    /// Hand the wake-up sender to the worker handle. Yields it only once.
    pub(crate) fn take_waker(&mut self) -> Option<SyncSender<Envelope>> {
        self.waker.take()
    }

    /// Drain every queued job in FIFO order without running it.
    pub fn drain(&self) -> Vec<Job> {
        let mut jobs = Vec::new();
        while let Ok(envelope) = self.receiver.try_recv() {
            if let Envelope::Run(job) = envelope {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                jobs.push(job);
            }
        }
        jobs
    }
}

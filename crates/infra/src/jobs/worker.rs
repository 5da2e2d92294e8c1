//! Single background worker that drains a [`JobQueue`](super::JobQueue).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, JobQueueConfig};

use super::queue::{self, Envelope, JobQueue, JobReceiver};
use super::types::Job;

#[derive(Debug, Error)]
pub enum JobWorkerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobWorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_panicked: u64,
    /// Jobs still queued (or dequeued after the stop signal) when the worker exited.
    pub jobs_discarded: u64,
}

/// Handle to control and join a running worker.
#[derive(Debug)]
pub struct JobWorkerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    waker: Option<SyncSender<Envelope>>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<JobWorkerStats>>,
}

impl JobWorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// A job already running is allowed to finish; jobs still queued are not
    /// executed. Returns the final statistics.
    pub fn shutdown(mut self) -> JobWorkerStats {
        let _ = self.shutdown.send(());
        // Wake a worker blocked on an empty queue. If the queue is full the
        // worker is busy and will see the signal before its next job.
        if let Some(waker) = self.waker.take() {
            let _ = waker.try_send(Envelope::Wake);
        }

        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(worker = %self.name, "job worker thread panicked");
            }
        }
        self.stats()
    }

    pub fn stats(&self) -> JobWorkerStats {
        lock_stats(&self.stats).clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}

/// Background job worker.
///
/// - Exactly one thread per queue, so jobs never run concurrently
/// - Waits at most `poll_interval` per dequeue attempt
/// - A failing or panicking job is logged and never stops the loop
#[derive(Debug)]
pub struct JobWorker;

impl JobWorker {
    /// Create a queue sized from `config` and start its worker.
    pub fn start(config: JobQueueConfig) -> Result<(JobQueue, JobWorkerHandle), JobWorkerError> {
        config.validate()?;
        let (queue, jobs) = queue::bounded(config.capacity);
        let handle = Self::spawn(config, jobs)?;
        Ok((queue, handle))
    }

    /// Start a worker thread draining `jobs`.
    pub fn spawn(
        config: JobQueueConfig,
        jobs: JobReceiver,
    ) -> Result<JobWorkerHandle, JobWorkerError> {
        config.validate()?;

        let mut jobs = jobs;
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(JobWorkerStats::default()));
        let waker = jobs.take_waker();

        let name = config.name.clone();
        let loop_stats = stats.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(config, jobs, shutdown_rx, loop_stats))?;

        Ok(JobWorkerHandle {
            name,
            shutdown: shutdown_tx,
            waker,
            join: Some(join),
            stats,
        })
    }
}

fn worker_loop(
    config: JobQueueConfig,
    jobs: JobReceiver,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<JobWorkerStats>>,
) {
    let name = config.name.as_str();
    info!(worker = name, capacity = config.capacity, "job worker started");

    let mut discarded: u64 = 0;
    loop {
        if shutdown_requested(&shutdown_rx) {
            break;
        }

        match jobs.recv_timeout(config.poll_interval) {
            Ok(Envelope::Run(job)) => {
                if shutdown_requested(&shutdown_rx) {
                    debug!(worker = name, "shutdown requested; not running dequeued job");
                    discarded += 1;
                    break;
                }
                run_job(name, job, &stats);
            }
            Ok(Envelope::Wake) | Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!(worker = name, "all producers and the handle dropped");
                break;
            }
        }
    }

    discarded += jobs.drain().len() as u64;
    let processed = {
        let mut s = lock_stats(&stats);
        s.jobs_discarded += discarded;
        s.jobs_processed
    };
    info!(worker = name, processed, discarded, "job worker stopped");
}

/// A dropped handle alone leaves the worker running for the remaining
/// producers; the loop ends once the job channel disconnects as well.
fn shutdown_requested(shutdown_rx: &mpsc::Receiver<()>) -> bool {
    shutdown_rx.try_recv().is_ok()
}

fn run_job(worker: &str, job: Job, stats: &Mutex<JobWorkerStats>) {
    let label = job.name().unwrap_or("anonymous").to_string();
    debug!(worker, job = %label, "running job");

    let outcome = panic::catch_unwind(AssertUnwindSafe(move || job.run()));

    let mut s = lock_stats(stats);
    s.jobs_processed += 1;
    match outcome {
        Ok(Ok(())) => {
            s.jobs_succeeded += 1;
            debug!(worker, job = %label, "job completed");
        }
        Ok(Err(err)) => {
            s.jobs_failed += 1;
            warn!(worker, job = %label, error = %err, "job failed");
        }
        Err(payload) => {
            s.jobs_panicked += 1;
            error!(worker, job = %label, panic = panic_message(payload.as_ref()), "job panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

fn lock_stats(stats: &Mutex<JobWorkerStats>) -> MutexGuard<'_, JobWorkerStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Poll `handle` until `done` holds or `timeout` elapses.
#[cfg(test)]
pub(crate) fn wait_for_stats(
    handle: &JobWorkerHandle,
    timeout: std::time::Duration,
    done: impl Fn(&JobWorkerStats) -> bool,
) -> JobWorkerStats {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let stats = handle.stats();
        if done(&stats) || std::time::Instant::now() >= deadline {
            return stats;
        }
        thread::sleep(std::time::Duration::from_millis(5));
    }
}

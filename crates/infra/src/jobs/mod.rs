//! Background job queue with a single dedicated worker.
//!
//! ## Design
//!
//! - Bounded: `submit` never blocks and fails fast once the queue is full
//! - Many producers, exactly one consumer, FIFO execution
//! - Failures inside a job are contained at the worker boundary
//! - Explicit lifecycle: the worker is started and stopped through a handle
//!
//! ## Components
//!
//! - `Job` / `NamedJob`: deferred units of work
//! - `JobQueue`: producer half, shared by request threads
//! - `JobWorker`: spawns the worker thread draining the queue
//! - `JobWorkerHandle`: shutdown and statistics

pub mod queue;
pub mod types;
pub mod worker;

pub use queue::{JobQueue, JobQueueError, JobReceiver, bounded};
pub use types::{Job, NamedJob, SubmissionResult};
pub use worker::{JobWorker, JobWorkerError, JobWorkerHandle, JobWorkerStats};

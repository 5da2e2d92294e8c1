//! Optimistic-concurrency update protocol.
//!
//! ## Components
//!
//! - `VersionClock`: strictly increasing version stamps, waiting out small
//!   clock races and rejecting implausible skew
//! - `ConflictRetryExecutor`: fetch / apply / commit loop that retries lost
//!   races from a fresh read, up to a fixed bound
//! - `CancelToken`: cooperative cancellation for the clock's blocking wait
//!
//! Both primitives run on the caller's thread and hold no locks; conflict
//! detection is entirely the job of the store's conditional commit.

pub mod cancel;
pub mod clock;
pub mod retry;

pub use cancel::CancelToken;
pub use clock::{Clock, DEFAULT_SKEW_THRESHOLD, SystemClock, VersionClock};
pub use retry::{ConflictRetryExecutor, DEFAULT_MAX_ATTEMPTS, FnUpdate, RetryableUpdate};

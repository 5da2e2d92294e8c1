//! Get-modify-commit retry loop for optimistic concurrency.
//!
//! ```text
//! fetch ──▶ apply_change ──▶ commit ──ok──▶ return committed value
//!   ▲                          │
//!   └──── conflict (retries left) ◀┘      conflict (no retries left) ──▶ last conflict
//!                                         any other error ──▶ propagated as-is
//! ```
//!
//! Every attempt starts from a fresh `fetch`; a stale read is never reused, so
//! conditional changes ("set X only if currently Y") are recomputed against the
//! latest committed state.

use std::marker::PhantomData;

use tracing::{debug, warn};

use bedrock_core::ConflictAware;

/// Attempts made before a conflict is surfaced to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// The three operations the retry loop drives for one logical record.
pub trait RetryableUpdate {
    type Record;
    type Error: ConflictAware;

    /// Read the current persisted state.
    fn fetch(&mut self) -> Result<Self::Record, Self::Error>;

    /// Apply the caller's mutation. Must not perform IO.
    fn apply_change(&self, current: Self::Record) -> Result<Self::Record, Self::Error>;

    /// Persist the mutated value; fails with a conflict if another writer
    /// committed since `fetch`.
    fn commit(&mut self, updated: Self::Record) -> Result<Self::Record, Self::Error>;
}

/// [`RetryableUpdate`] assembled from three closures.
pub struct FnUpdate<T, E, Fe, Ap, Co> {
    fetch: Fe,
    apply: Ap,
    commit: Co,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, Fe, Ap, Co> FnUpdate<T, E, Fe, Ap, Co>
where
    Fe: FnMut() -> Result<T, E>,
    Ap: Fn(T) -> Result<T, E>,
    Co: FnMut(T) -> Result<T, E>,
{
    pub fn new(fetch: Fe, apply: Ap, commit: Co) -> Self {
        Self {
            fetch,
            apply,
            commit,
            _marker: PhantomData,
        }
    }
}

impl<T, E, Fe, Ap, Co> RetryableUpdate for FnUpdate<T, E, Fe, Ap, Co>
where
    E: ConflictAware,
    Fe: FnMut() -> Result<T, E>,
    Ap: Fn(T) -> Result<T, E>,
    Co: FnMut(T) -> Result<T, E>,
{
    type Record = T;
    type Error = E;

    fn fetch(&mut self) -> Result<T, E> {
        (self.fetch)()
    }

    fn apply_change(&self, current: T) -> Result<T, E> {
        (self.apply)(current)
    }

    fn commit(&mut self, updated: T) -> Result<T, E> {
        (self.commit)(updated)
    }
}

/// Applies updates to concurrently modified records, retrying lost races.
///
/// Holds no locks and no state between calls; correctness rests on the
/// atomic check-and-set performed by `commit`.
#[derive(Debug, Copy, Clone)]
pub struct ConflictRetryExecutor {
    max_attempts: u32,
}

impl Default for ConflictRetryExecutor {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ConflictRetryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the attempt bound (at least one attempt is always made).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `update` until a commit succeeds, a non-conflict error occurs, or
    /// the attempt bound is exhausted (in which case the last conflict is
    /// returned).
    pub fn run<U>(&self, update: &mut U) -> Result<U::Record, U::Error>
    where
        U: RetryableUpdate,
    {
        let mut attempts_remaining = self.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let current = update.fetch()?;
            let changed = update.apply_change(current)?;

            match update.commit(changed) {
                Ok(committed) => {
                    if attempt > 1 {
                        debug!(attempt, "commit succeeded after retry");
                    }
                    return Ok(committed);
                }
                Err(err) if err.is_concurrent_modification() => {
                    attempts_remaining -= 1;
                    if attempts_remaining == 0 {
                        warn!(
                            attempts = attempt,
                            "giving up after repeated concurrent modifications"
                        );
                        return Err(err);
                    }
                    debug!(
                        attempt,
                        remaining = attempts_remaining,
                        "concurrent modification; retrying from a fresh read"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Closure form of [`run`](Self::run).
    pub fn run_with<T, E, Fe, Ap, Co>(&self, fetch: Fe, apply: Ap, commit: Co) -> Result<T, E>
    where
        E: ConflictAware,
        Fe: FnMut() -> Result<T, E>,
        Ap: Fn(T) -> Result<T, E>,
        Co: FnMut(T) -> Result<T, E>,
    {
        self.run(&mut FnUpdate::new(fetch, apply, commit))
    }
}

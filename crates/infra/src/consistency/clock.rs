//! Version stamp generation for optimistic concurrency.
//!
//! `VersionClock::next(previous)` hands out a wall-clock stamp strictly greater
//! than `previous`. When the clock has not yet moved past `previous` (rapid
//! successive writes, coarse clock granularity, small skew between writers) the
//! caller is **blocked** until it has, rather than being handed `previous + 1`.
//! A `previous` more than the skew threshold ahead of the clock is rejected as
//! corrupted upstream state.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use bedrock_core::{DomainError, DomainResult, VersionStamp};

use super::cancel::CancelToken;

/// Largest gap between a prior stamp and the wall clock that is waited out.
pub const DEFAULT_SKEW_THRESHOLD: Duration = Duration::from_secs(5);

/// Source of wall-clock time, in version-stamp units.
pub trait Clock: Send + Sync {
    fn now(&self) -> VersionStamp;
}

/// Reads the system clock through `chrono`.
#[derive(Debug, Copy, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> VersionStamp {
        VersionStamp::from_datetime(Utc::now())
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> VersionStamp {
        (**self).now()
    }
}

/// Generates version stamps that are strictly increasing per record.
///
/// Stateless apart from its clock source; share freely.
#[derive(Debug, Clone)]
pub struct VersionClock<C = SystemClock> {
    clock: C,
    skew_threshold: Duration,
}

impl VersionClock<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for VersionClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> VersionClock<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            skew_threshold: DEFAULT_SKEW_THRESHOLD,
        }
    }

    pub fn with_skew_threshold(mut self, threshold: Duration) -> Self {
        self.skew_threshold = threshold;
        self
    }

    pub fn skew_threshold(&self) -> Duration {
        self.skew_threshold
    }

    /// Returns a stamp strictly greater than `previous`.
    ///
    /// May sleep the calling thread for up to the skew threshold. Fails with
    /// [`DomainError::ClockSkew`] when `previous` is further ahead than that.
    pub fn next(&self, previous: VersionStamp) -> DomainResult<VersionStamp> {
        self.next_with(previous, |wait| {
            thread::sleep(wait);
            Ok(())
        })
    }

    /// Like [`next`](Self::next), but the wait ends early with
    /// [`DomainError::Interrupted`] once `cancel` fires.
    ///
    /// A stamp that needs no wait is returned even if `cancel` already fired.
    pub fn next_cancellable(
        &self,
        previous: VersionStamp,
        cancel: &CancelToken,
    ) -> DomainResult<VersionStamp> {
        self.next_with(previous, |wait| {
            if cancel.wait_timeout(wait) {
                Err(DomainError::Interrupted)
            } else {
                Ok(())
            }
        })
    }

    fn next_with(
        &self,
        previous: VersionStamp,
        mut wait: impl FnMut(Duration) -> DomainResult<()>,
    ) -> DomainResult<VersionStamp> {
        loop {
            let now = self.clock.now();
            if now > previous {
                return Ok(now);
            }

            let gap = previous.duration_since(now);
            if gap > self.skew_threshold {
                return Err(DomainError::ClockSkew { previous, now });
            }

            let pause = gap + Duration::from_millis(1);
            debug!(
                previous = %previous,
                now = %now,
                wait_ms = pause.as_millis() as u64,
                "version clock behind previous stamp; waiting"
            );
            wait(pause)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Instant;

    /// Clock that never moves.
    struct FixedClock(VersionStamp);

    impl Clock for FixedClock {
        fn now(&self) -> VersionStamp {
            self.0
        }
    }

    /// Clock that advances by one millisecond on every read.
    struct TickingClock {
        millis: AtomicU64,
        reads: AtomicUsize,
    }

    impl TickingClock {
        fn starting_at(millis: u64) -> Self {
            Self {
                millis: AtomicU64::new(millis),
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl Clock for TickingClock {
        fn now(&self) -> VersionStamp {
            self.reads.fetch_add(1, Ordering::SeqCst);
            VersionStamp::from_millis(self.millis.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn returns_now_when_clock_is_ahead() {
        let clock = VersionClock::with_clock(FixedClock(VersionStamp::from_millis(1_000)));
        let next = clock.next(VersionStamp::from_millis(999)).unwrap();
        assert_eq!(next, VersionStamp::from_millis(1_000));
    }

    #[test]
    fn rejects_previous_far_in_the_future() {
        let clock = VersionClock::with_clock(FixedClock(VersionStamp::from_millis(10_000)));
        let err = clock
            .next(VersionStamp::from_millis(10_000 + 5_001))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::ClockSkew {
                previous: VersionStamp::from_millis(15_001),
                now: VersionStamp::from_millis(10_000),
            }
        );
    }

    #[test]
    fn custom_skew_threshold_is_honoured() {
        let clock = VersionClock::with_clock(FixedClock(VersionStamp::from_millis(10_000)))
            .with_skew_threshold(Duration::from_millis(10));
        assert_eq!(clock.skew_threshold(), Duration::from_millis(10));
        assert_eq!(VersionClock::new().skew_threshold(), DEFAULT_SKEW_THRESHOLD);
        let err = clock.next(VersionStamp::from_millis(10_011)).unwrap_err();
        assert!(matches!(err, DomainError::ClockSkew { .. }));
    }

    #[test]
    fn waits_until_clock_passes_previous() {
        let ticking = Arc::new(TickingClock::starting_at(1_000));
        let clock = VersionClock::with_clock(ticking.clone());

        let next = clock.next(VersionStamp::from_millis(1_003)).unwrap();

        assert_eq!(next, VersionStamp::from_millis(1_004));
        assert_eq!(ticking.reads.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn equal_previous_is_not_returned() {
        let clock = VersionClock::new();
        let previous = clock.next(VersionStamp::ZERO).unwrap();
        let next = clock.next(previous).unwrap();
        assert!(next > previous);
    }

    #[test]
    fn system_clock_blocks_for_slightly_future_stamp() {
        let clock = VersionClock::new();
        let previous = VersionStamp::from_millis(SystemClock.now().as_millis() + 50);

        let started = Instant::now();
        let next = clock.next(previous).unwrap();

        assert!(next > previous);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn cancelled_wait_is_interrupted() {
        let clock = VersionClock::new();
        let previous = VersionStamp::from_millis(SystemClock.now().as_millis() + 3_000);
        let cancel = CancelToken::new();
        let remote = cancel.clone();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let started = Instant::now();
        let err = clock.next_cancellable(previous, &cancel).unwrap_err();

        assert_eq!(err, DomainError::Interrupted);
        assert!(started.elapsed() < Duration::from_millis(2_500));
        canceller.join().unwrap();
    }

    #[test]
    fn cancellation_does_not_block_an_immediate_stamp() {
        let clock = VersionClock::with_clock(FixedClock(VersionStamp::from_millis(500)));
        let cancel = CancelToken::new();
        cancel.cancel();

        let next = clock
            .next_cancellable(VersionStamp::from_millis(100), &cancel)
            .unwrap();
        assert_eq!(next, VersionStamp::from_millis(500));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 32,
                ..ProptestConfig::default()
            })]

            /// Property: chaining `next` on its own output always moves forward,
            /// starting from anywhere between far in the past and slightly ahead
            /// of the wall clock.
            #[test]
            fn chained_stamps_strictly_increase(
                offset_ms in -100_000i64..20i64,
                chain_len in 1usize..6,
            ) {
                let clock = VersionClock::new();
                let now = SystemClock.now().as_millis() as i64;
                let mut previous = VersionStamp::from_millis((now + offset_ms).max(0) as u64);

                for _ in 0..chain_len {
                    let next = clock.next(previous).unwrap();
                    prop_assert!(next > previous);
                    previous = next;
                }
            }
        }
    }
}

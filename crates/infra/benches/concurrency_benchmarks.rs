use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bedrock_core::{ExpectedVersion, RecordId, VersionStamp};
use bedrock_infra::consistency::{Clock, ConflictRetryExecutor, VersionClock};
use bedrock_infra::jobs::{bounded, Job};
use bedrock_infra::record_store::{InMemoryRecordStore, RecordStore, StoredRecordUpdate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Clock that moves one millisecond per read, so stamping never sleeps.
#[derive(Clone)]
struct CountingClock(Arc<AtomicU64>);

impl Clock for CountingClock {
    fn now(&self) -> VersionStamp {
        VersionStamp::from_millis(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

fn bench_job_submission(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_submission");

    for batch_size in [1usize, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let (queue, receiver) = bounded(batch_size);
                b.iter(|| {
                    for _ in 0..batch_size {
                        queue.submit(Job::from_fn(|| {})).unwrap();
                    }
                    black_box(receiver.drain());
                });
            },
        );
    }

    group.finish();
}

fn bench_version_clock(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_clock");

    group.bench_function("next_after_past_stamp", |b| {
        let clock = VersionClock::new();
        b.iter(|| black_box(clock.next(black_box(VersionStamp::from_millis(1))).unwrap()));
    });

    group.finish();
}

fn bench_uncontended_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_update");
    group.sample_size(1000);

    group.bench_function("fetch_apply_commit", |b| {
        let store: InMemoryRecordStore<RecordId, u64> = InMemoryRecordStore::new();
        let id = RecordId::new();
        store
            .commit(
                &id,
                0,
                ExpectedVersion::Exact(VersionStamp::ZERO),
                VersionStamp::from_millis(1),
            )
            .unwrap();
        let ticks = CountingClock(Arc::new(AtomicU64::new(2)));
        let executor = ConflictRetryExecutor::new();

        b.iter(|| {
            let mut update = StoredRecordUpdate::new(&store, id, |n: u64| Ok(n + 1))
                .with_clock(VersionClock::with_clock(ticks.clone()));
            black_box(executor.run(&mut update).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_job_submission,
    bench_version_clock,
    bench_uncontended_update
);
criterion_main!(benches);

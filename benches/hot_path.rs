use bench_stats::{defaults, OperationStats, PercentileEstimator, Timer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};

fn bench_timer(c: &mut Criterion) {
    c.bench_function("timer_start_stop", |b| {
        let mut timer = Timer::new();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_micros(250);
        b.iter(|| {
            timer.start_at(black_box(t0));
            black_box(timer.stop_at(t1).ok());
        })
    });
}

fn bench_estimator(c: &mut Criterion) {
    let estimator = PercentileEstimator::new(
        defaults::PERCENTILE_GRANULARITY,
        defaults::PERCENTILE_MIN_VALUE,
        defaults::PERCENTILE_MAX_VALUE,
    )
    .unwrap();

    c.bench_function("estimator_update", |b| {
        let mut value = 1_000u64;
        b.iter(|| {
            value = value.wrapping_mul(6364136223846793005).wrapping_add(1) % 100_000_000 + 1;
            estimator.update(black_box(value));
        })
    });

    c.bench_function("estimator_calculate", |b| {
        b.iter(|| black_box(estimator.calculate(95)))
    });
}

fn bench_operation_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_start_stop");
    for checkpointing in [false, true] {
        let stats = OperationStats::new(1, checkpointing).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(if checkpointing { "checkpointing" } else { "plain" }),
            &stats,
            |b, stats| {
                b.iter(|| {
                    stats.start(0).unwrap();
                    black_box(stats.stop(0).unwrap());
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_timer, bench_estimator, bench_operation_stats);
criterion_main!(benches);

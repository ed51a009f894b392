use criterion::{criterion_group, criterion_main, Criterion};
use rps_arena::game::{resolve, Choice};

/// Benchmark a sole-winner settlement (the common decisive case)
fn bench_resolve_decisive(c: &mut Criterion) {
    let seats = [
        (1, Choice::Rock),
        (2, Choice::Rock),
        (3, Choice::Paper),
    ];

    c.bench_function("resolve_decisive_3_seats", |b| {
        b.iter(|| resolve(&seats, 1_000, 500));
    });
}

/// Benchmark a split-win settlement with remainder distribution
fn bench_resolve_split(c: &mut Criterion) {
    let seats = [
        (1, Choice::Scissors),
        (2, Choice::Paper),
        (3, Choice::Scissors),
    ];

    c.bench_function("resolve_split_win", |b| {
        b.iter(|| resolve(&seats, 333, 500));
    });
}

/// Benchmark an all-distinct draw
fn bench_resolve_draw(c: &mut Criterion) {
    let seats = [
        (1, Choice::Rock),
        (2, Choice::Paper),
        (3, Choice::Scissors),
    ];

    c.bench_function("resolve_draw_3_seats", |b| {
        b.iter(|| resolve(&seats, 1_000, 500));
    });
}

criterion_group!(
    benches,
    bench_resolve_decisive,
    bench_resolve_split,
    bench_resolve_draw
);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use fiber_rt::sync::Mutex;
use fiber_rt::{RoundRobin, RuntimeConfig};
use std::sync::Arc;

fn install() {
    let config = RuntimeConfig::builder(Arc::new(RoundRobin::new())).build();
    fiber_rt::use_scheduling_algorithm(config);
}

fn spawn_and_join(c: &mut Criterion) {
    install();

    c.bench_function("spawn_and_join", |b| {
        b.iter(|| {
            let handle = fiber_rt::spawn(|| criterion::black_box(1 + 1)).unwrap();
            fiber_rt::run();
            criterion::black_box(handle.join().unwrap());
        });
    });
}

fn yield_round_trip(c: &mut Criterion) {
    install();

    c.bench_function("yield_round_trip_x1000", |b| {
        b.iter(|| {
            let handle = fiber_rt::spawn(|| {
                for _ in 0..1000 {
                    fiber_rt::yield_now();
                }
            })
            .unwrap();
            fiber_rt::run();
            handle.join().unwrap();
        });
    });
}

fn uncontended_mutex(c: &mut Criterion) {
    install();
    let mutex = Mutex::new(0u64);

    c.bench_function("uncontended_mutex_lock_unlock", |b| {
        b.iter(|| {
            let mut guard = mutex.lock();
            *guard = criterion::black_box(*guard + 1);
        });
    });
}

fn contended_mutex_handoff(c: &mut Criterion) {
    install();

    c.bench_function("mutex_handoff_between_two_fibers", |b| {
        b.iter(|| {
            let mutex = Arc::new(Mutex::new(0u64));

            let a = {
                let mutex = mutex.clone();
                fiber_rt::spawn(move || {
                    for _ in 0..100 {
                        let mut guard = mutex.lock();
                        *guard += 1;
                        drop(guard);
                        fiber_rt::yield_now();
                    }
                })
                .unwrap()
            };
            let b_handle = {
                let mutex = mutex.clone();
                fiber_rt::spawn(move || {
                    for _ in 0..100 {
                        let mut guard = mutex.lock();
                        *guard += 1;
                        drop(guard);
                        fiber_rt::yield_now();
                    }
                })
                .unwrap()
            };

            fiber_rt::run();
            a.join().unwrap();
            b_handle.join().unwrap();
        });
    });
}

criterion_group!(
    benches,
    spawn_and_join,
    yield_round_trip,
    uncontended_mutex,
    contended_mutex_handoff
);
criterion_main!(benches);

//! End-to-end scenarios exercising a whole installed scheduler rather than
//! a single module in isolation. Each test installs its own algorithm on
//! the calling thread and drives it with `fiber_rt::run`.

use fiber_rt::sync::{CondVar, Mutex};
use fiber_rt::{JoinError, RoundRobin, RuntimeConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

fn install_round_robin() {
    let config = RuntimeConfig::builder(Arc::new(RoundRobin::new())).build();
    fiber_rt::use_scheduling_algorithm(config);
}

#[test]
fn yield_round_trip() {
    install_round_robin();

    let log = Arc::new(StdMutex::new(String::new()));

    for label in ['A', 'B', 'C'] {
        let log = log.clone();
        fiber_rt::spawn(move || {
            for _ in 0..5 {
                log.lock().unwrap().push(label);
                fiber_rt::yield_now();
            }
        })
        .unwrap();
    }

    fiber_rt::run();

    assert_eq!(log.lock().unwrap().as_str(), "ABCABCABCABCABCABC");
}

#[test]
fn mutex_handoff() {
    install_round_robin();

    let mutex = Arc::new(Mutex::new(0u32));
    let order = Arc::new(StdMutex::new(Vec::new()));

    {
        let mutex = mutex.clone();
        let order = order.clone();
        fiber_rt::spawn(move || {
            let mut guard = mutex.lock();
            *guard += 1;
            for _ in 0..3 {
                fiber_rt::yield_now();
            }
            order.lock().unwrap().push('X');
            drop(guard);
        })
        .unwrap();
    }

    {
        let mutex = mutex.clone();
        let order = order.clone();
        fiber_rt::spawn(move || {
            // Yield once so X has already taken the lock by the time Y
            // contends for it.
            fiber_rt::yield_now();
            let guard = mutex.lock();
            order.lock().unwrap().push('Y');
            assert_eq!(*guard, 1);
        })
        .unwrap();
    }

    fiber_rt::run();

    assert_eq!(*order.lock().unwrap(), vec!['X', 'Y']);
}

#[test]
fn condvar_notify_all_wakes_every_waiter() {
    install_round_robin();

    let state = Arc::new((Mutex::new(0u32), CondVar::new()));
    let woken = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let state = state.clone();
        let woken = woken.clone();
        fiber_rt::spawn(move || {
            let (mutex, cv) = &*state;
            let mut guard = mutex.lock();
            while *guard == 0 {
                guard = cv.wait(guard);
            }
            woken.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    {
        let state = state.clone();
        fiber_rt::spawn(move || {
            let (mutex, cv) = &*state;
            fiber_rt::yield_now();
            fiber_rt::yield_now();
            let mut guard = mutex.lock();
            *guard = 1;
            drop(guard);
            cv.notify_all();
        })
        .unwrap();
    }

    fiber_rt::run();

    assert_eq!(woken.load(Ordering::SeqCst), 2);
}

#[test]
fn timed_wait_times_out_and_returns_with_the_mutex_held() {
    install_round_robin();

    let elapsed = Arc::new(StdMutex::new(None));
    let elapsed_out = elapsed.clone();

    fiber_rt::spawn(move || {
        let mutex = Mutex::new(());
        let cv = CondVar::new();
        let guard = mutex.lock();

        let start = Instant::now();
        let (guard, timed_out) = cv.wait_until(guard, start + Duration::from_millis(50));
        let duration = start.elapsed();
        assert!(timed_out);
        // `wait_until` re-locks the mutex before returning: this would
        // deadlock if we didn't already hold it.
        drop(guard);
        *elapsed_out.lock().unwrap() = Some(duration);
    })
    .unwrap();

    fiber_rt::run();

    let duration = elapsed.lock().unwrap().expect("fiber didn't run to completion");
    assert!(duration >= Duration::from_millis(50));
    assert!(duration < Duration::from_millis(500), "timeout took suspiciously long: {duration:?}");
}

#[test]
fn interrupting_a_looping_fiber_cancels_it() {
    install_round_robin();

    let iterations = Arc::new(AtomicUsize::new(0));
    let iterations_inner = iterations.clone();

    let handle = fiber_rt::spawn(move || loop {
        iterations_inner.fetch_add(1, Ordering::Relaxed);
        fiber_rt::yield_now();
        fiber_rt::interruption_point();
    })
    .unwrap();

    let outcome = Arc::new(StdMutex::new(None));
    let outcome_inner = outcome.clone();

    // `interrupt`/`join` both have to run from inside a fiber: `join` parks
    // the calling fiber on the target's joiner list, and only a fiber (not
    // the bootstrap thread itself) can be parked that way.
    fiber_rt::spawn(move || {
        for _ in 0..3 {
            fiber_rt::yield_now();
        }
        handle.interrupt();
        *outcome_inner.lock().unwrap() = Some(handle.join());
    })
    .unwrap();

    fiber_rt::run();

    match outcome.lock().unwrap().take().expect("joining fiber never ran to completion") {
        Err(JoinError::Cancelled) => {}
        other => panic!("expected JoinError::Cancelled, got {other:?}"),
    }
    assert!(iterations.load(Ordering::Relaxed) > 0);
}

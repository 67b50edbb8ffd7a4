//! Confirms fibers actually migrate across threads under the work-stealing
//! policy, rather than merely not crashing. Wall-clock speedup ratios are
//! left to the benchmark; this just checks the distribution.

#![cfg(feature = "work-stealing")]

use fiber_rt::{RuntimeConfig, WorkStealing};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

const THREADS: usize = 4;
const FIBERS_PER_THREAD: usize = 64;

#[test]
fn fibers_spread_across_threads() {
    let algorithm = Arc::new(WorkStealing::new());
    let seen: Arc<Mutex<HashSet<ThreadId>>> = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let algorithm = algorithm.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                let config = RuntimeConfig::builder(algorithm).build();
                fiber_rt::use_scheduling_algorithm(config);

                for _ in 0..FIBERS_PER_THREAD {
                    let seen = seen.clone();
                    fiber_rt::spawn(move || {
                        // A little CPU-bound busy work so a fast thread
                        // actually gets a chance to steal from a slow one
                        // before everything finishes.
                        let mut acc = 0u64;
                        for i in 0..50_000 {
                            acc = acc.wrapping_add(i);
                        }
                        std::hint::black_box(acc);
                        seen.lock().unwrap().insert(thread::current().id());
                    })
                    .unwrap();
                }

                fiber_rt::run();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let distinct = seen.lock().unwrap().len();
    assert!(
        distinct > 1,
        "expected fibers to run on more than one thread, saw {distinct}"
    );
}

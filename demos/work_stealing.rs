//! Loads one thread up with all the work, then lets three idle threads
//! steal it away: each fiber records which thread it finished on, which
//! ends up spread across all four once stealing kicks in.

use fiber_rt::{RuntimeConfig, WorkStealing};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 4;
const JOBS: usize = 200;

fn main() {
    env_logger::init();

    let algorithm = Arc::new(WorkStealing::new());
    let installed = Arc::new(Barrier::new(THREADS));
    let spawned = Arc::new(Barrier::new(THREADS));

    let threads: Vec<_> = (0..THREADS)
        .map(|worker_id| {
            let algorithm = algorithm.clone();
            let installed = installed.clone();
            let spawned = spawned.clone();
            thread::spawn(move || {
                let config = RuntimeConfig::builder(algorithm).build();
                fiber_rt::use_scheduling_algorithm(config);
                installed.wait();

                if worker_id == 0 {
                    for job in 0..JOBS {
                        fiber_rt::spawn(move || {
                            let mut acc = 0u64;
                            for i in 0..200_000 {
                                acc = acc.wrapping_add(i);
                            }
                            std::hint::black_box(acc);
                            println!("job {job} finished on {:?}", thread::current().id());
                        })
                        .expect("failed to spawn demo fiber");
                    }
                }
                // Idle threads wait here rather than racing thread 0 into
                // `run()`: with nothing of their own queued yet and nothing
                // stealable, they'd otherwise see an empty deque and return
                // immediately instead of sticking around to steal.
                spawned.wait();

                fiber_rt::run();
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
}

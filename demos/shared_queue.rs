//! Four OS threads pulling from one shared ready queue: a fiber spawned on
//! one thread may well finish its run on another, wherever the queue's
//! mutex next hands it out.

use fiber_rt::{RuntimeConfig, SharedQueue};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 4;

fn main() {
    env_logger::init();

    let algorithm = Arc::new(SharedQueue::new());
    // Two barriers: the first keeps every thread's `use_scheduling_algorithm`
    // call from racing the one thread that spawns the demo's jobs, the
    // second keeps the others from calling `run()` (and finding an empty
    // queue) before those jobs actually land in it.
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
                    for job in 0..8 {
                        fiber_rt::spawn(move || {
                            println!("job {job} ran on {:?}", thread::current().id());
                            fiber_rt::yield_now();
                            println!("job {job} resumed on {:?}", thread::current().id());
                        })
                        .expect("failed to spawn demo fiber");
                    }
                }
                spawned.wait();

                fiber_rt::run();
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
}

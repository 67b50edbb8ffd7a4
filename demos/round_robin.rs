//! Three fibers on one thread, strictly round-robin: each runs to its own
//! yield point before the next gets a turn, and none of them ever migrate.

fn main() {
    env_logger::init();

    let config = fiber_rt::RuntimeConfig::builder(std::sync::Arc::new(fiber_rt::RoundRobin::new())).build();
    fiber_rt::use_scheduling_algorithm(config);

    for name in ["alpha", "beta", "gamma"] {
        fiber_rt::spawn(move || {
            for round in 0..3 {
                println!("{name}: round {round}");
                fiber_rt::yield_now();
            }
        })
        .expect("failed to spawn demo fiber");
    }

    fiber_rt::run();
}

use context::Transfer;
use raw_fiber::{DefaultStackAllocator, RawContext, StackAllocator};
use std::sync::atomic::{AtomicUsize, Ordering};

static RAN: AtomicUsize = AtomicUsize::new(0);

extern "C" fn count_and_park(t: Transfer) -> ! {
    raw_fiber::enter(t);
    RAN.fetch_add(1, Ordering::SeqCst);
    unsafe {
        raw_fiber::suspend(0);
    }
    panic!("count_and_park resumed after parking");
}

#[test]
fn resume_runs_entry_once() {
    let before = RAN.load(Ordering::SeqCst);

    let stack = DefaultStackAllocator.allocate(16 * 1024).unwrap();
    let mut ctx = RawContext::new(stack, count_and_park);

    unsafe {
        ctx.resume(0);
    }

    assert_eq!(RAN.load(Ordering::SeqCst), before + 1);
}

extern "C" fn echo_back(t: Transfer) -> ! {
    let mut data = raw_fiber::enter(t);
    loop {
        data = unsafe { raw_fiber::suspend(data + 1) };
    }
}

#[test]
fn resume_round_trips_data() {
    let stack = DefaultStackAllocator.allocate(16 * 1024).unwrap();
    let mut ctx = RawContext::new(stack, echo_back);

    let first = unsafe { ctx.resume(10) };
    let second = unsafe { ctx.resume(first) };

    assert_eq!(first, 11);
    assert_eq!(second, 12);
}

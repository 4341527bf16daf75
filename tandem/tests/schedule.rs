mod common;

use common::{eventually, executor};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn scheduled_action_fires_after_its_delay() {
    let executor = executor(1);
    let fired_at = Arc::new(Mutex::new(None));
    let start = Instant::now();

    let scheduled = {
        let fired_at = fired_at.clone();
        executor
            .schedule(
                move || *fired_at.lock() = Some(Instant::now()),
                Duration::from_millis(30),
            )
            .unwrap()
    };

    assert!(eventually(Duration::from_secs(5), || fired_at.lock().is_some()));

    let fired_at = fired_at.lock().unwrap();
    assert!(fired_at.duration_since(start) >= Duration::from_millis(30));
    assert!(scheduled.is_fired());
    assert!(scheduled.is_done());
    assert!(!scheduled.cancel());
}

#[test]
fn cancelled_action_never_runs() {
    let executor = executor(1);
    let ran = Arc::new(AtomicBool::new(false));

    let scheduled = {
        let ran = ran.clone();
        executor
            .schedule(
                move || ran.store(true, Ordering::SeqCst),
                Duration::from_millis(100),
            )
            .unwrap()
    };

    thread::sleep(Duration::from_millis(10));
    assert!(scheduled.cancel());
    assert!(!scheduled.cancel());
    assert!(scheduled.is_cancelled());

    thread::sleep(Duration::from_millis(200));
    assert!(!ran.load(Ordering::SeqCst));
    assert!(!scheduled.is_fired());
}

#[test]
fn scheduled_action_ignores_application_pause() {
    let executor = executor(1);
    let paused = Arc::new(AtomicBool::new(true));
    let ran_while_paused = Arc::new(AtomicBool::new(false));

    {
        let paused = paused.clone();
        let ran_while_paused = ran_while_paused.clone();
        executor
            .schedule(
                move || ran_while_paused.store(paused.load(Ordering::SeqCst), Ordering::SeqCst),
                Duration::ZERO,
            )
            .unwrap();
    }

    assert!(eventually(Duration::from_secs(5), || ran_while_paused
        .load(Ordering::SeqCst)));
    paused.store(false, Ordering::SeqCst);
}

#[test]
fn earlier_deadlines_fire_first() {
    let executor = executor(1);
    let log = Arc::new(Mutex::new(Vec::new()));

    for (name, delay) in [("late", 80), ("early", 10), ("middle", 40)] {
        let log = log.clone();
        executor
            .schedule(
                move || log.lock().push(name),
                Duration::from_millis(delay),
            )
            .unwrap();
    }

    assert!(eventually(Duration::from_secs(5), || log.lock().len() == 3));
    assert_eq!(*log.lock(), ["early", "middle", "late"]);
}

#[test]
fn affine_schedule_lands_in_the_affinity_queue() {
    let executor = executor(1);
    let ran_on = Arc::new(Mutex::new(None));

    let scheduled = {
        let ran_on = ran_on.clone();
        executor
            .schedule_affine(
                move || *ran_on.lock() = Some(thread::current().id()),
                Duration::from_millis(5),
            )
            .unwrap()
    };

    assert!(eventually(Duration::from_secs(5), || scheduled.is_fired()));
    assert!(ran_on.lock().is_none());

    assert!(eventually(Duration::from_secs(5), || {
        executor.process_queued();
        ran_on.lock().is_some()
    }));
    assert_eq!(*ran_on.lock(), Some(thread::current().id()));
}

#[test]
fn many_entries_with_the_same_delay_all_fire() {
    let executor = executor(2);
    let count = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let count = count.clone();
            executor
                .schedule(
                    move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    },
                    Duration::from_millis(5),
                )
                .unwrap()
        })
        .collect();

    assert!(eventually(Duration::from_secs(5), || count
        .load(Ordering::SeqCst)
        == 50));
    assert!(handles.iter().all(|h| h.is_fired()));
}

#[test]
fn huge_delay_is_accepted() {
    let executor = executor(1);

    let scheduled = executor.schedule(|| (), Duration::MAX).unwrap();

    assert!(!scheduled.is_done());
    assert!(scheduled.cancel());
}

mod common;

use common::{eventually, executor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tandem::Error;
use tandem::task::TaskState;

#[test]
fn spawn_returns_the_computed_value() {
    let executor = executor(2);

    let handle = executor.spawn(|| "value".to_owned()).unwrap();

    assert_eq!(handle.wait().unwrap(), "value");
    assert!(handle.is_done());
    assert_eq!(handle.state(), TaskState::Completed);
}

#[test]
fn panic_is_reported_and_the_pool_keeps_running() {
    let executor = executor(1);

    let failed = executor.spawn(|| -> u32 { panic!("boom") }).unwrap();

    match failed.wait() {
        Err(Error::Computation(failure)) => assert_eq!(failure.message(), "boom"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(failed.state(), TaskState::Failed);

    let next = executor.spawn(|| 7).unwrap();
    assert_eq!(next.wait().unwrap(), 7);
}

#[test]
fn every_waiter_sees_the_same_value_and_work_runs_once() {
    let executor = executor(2);
    let runs = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Barrier::new(2));

    let handle = {
        let runs = runs.clone();
        let gate = gate.clone();
        executor
            .spawn(move || {
                gate.wait();
                runs.fetch_add(1, Ordering::SeqCst);
                99
            })
            .unwrap()
    };

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || handle.wait().unwrap())
        })
        .collect();

    gate.wait();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), 99);
    }
    assert_eq!(handle.wait().unwrap(), 99);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn wait_timeout_gives_up_then_succeeds() {
    let executor = executor(1);
    let gate = Arc::new(Barrier::new(2));

    let handle = {
        let gate = gate.clone();
        executor
            .spawn(move || {
                gate.wait();
                5
            })
            .unwrap()
    };

    assert!(matches!(
        handle.wait_timeout(Duration::from_millis(20)),
        Err(Error::TimedOut)
    ));
    assert!(!handle.is_done());

    gate.wait();
    assert_eq!(handle.wait_timeout(Duration::from_secs(5)).unwrap(), 5);
}

#[test]
fn execute_runs_without_a_handle() {
    let executor = executor(2);
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = counter.clone();
        executor
            .execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    assert!(eventually(Duration::from_secs(5), || counter
        .load(Ordering::SeqCst)
        == 10));
}

#[test]
fn execute_survives_a_panicking_job() {
    let executor = executor(1);

    executor.execute(|| panic!("ignored")).unwrap();

    assert_eq!(executor.spawn(|| 1).unwrap().wait().unwrap(), 1);
}

#[test]
fn pending_background_task_can_be_cancelled() {
    let executor = executor(1);
    let gate = Arc::new(Barrier::new(2));

    let blocker = {
        let gate = gate.clone();
        executor
            .spawn(move || {
                gate.wait();
            })
            .unwrap()
    };
    let queued = executor.spawn(|| 1).unwrap();

    assert!(queued.cancel());
    assert_eq!(queued.state(), TaskState::Cancelled);
    assert!(!queued.cancel());

    gate.wait();
    blocker.wait().unwrap();
    assert!(matches!(queued.wait(), Err(Error::Cancelled)));
}

#[test]
fn handles_cross_threads() {
    let executor = executor(2);
    let handle = executor.handle();

    let result = thread::spawn(move || handle.spawn(|| 3 * 3).unwrap().wait().unwrap())
        .join()
        .unwrap();

    assert_eq!(result, 9);
}

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;
use std::time::{Duration, Instant};
use tandem::{ExecutorBuilder, ExecutorService};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Builds an executor with `workers` background threads and test logging.
pub fn executor(workers: usize) -> ExecutorService {
    init_test_logging();

    ExecutorBuilder::new()
        .worker_threads(workers)
        .thread_name("tandem-test")
        .build()
        .expect("failed to build executor")
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if condition() {
            return true;
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    condition()
}

//! # Tandem
//!
//! **Tandem** is a task executor for applications that split their work
//! between a pool of background threads and one *affinity thread*, the
//! thread that owns render or UI state.
//!
//! It offers:
//!
//! - **Background work** on a work-stealing pool, with panics captured into
//!   the task instead of killing worker threads
//! - **Affine work** queued for the affinity thread and drained, in
//!   submission order, by the render/update loop once per tick
//! - **Delayed one-shot scheduling** on a dedicated timer thread that keeps
//!   firing while the rest of the application is paused
//! - **Blocking task handles** that any number of threads can wait on
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tandem::ExecutorBuilder;
//! use std::time::Duration;
//!
//! let executor = ExecutorBuilder::new().worker_threads(4).build()?;
//! let driver = executor.affinity_driver();
//!
//! // Decode on the pool, upload on the render thread.
//! let pixels = executor.spawn(|| decode("hero.png"))?;
//! let handle = executor.handle();
//! executor.execute(move || {
//!     let pixels = pixels.wait().unwrap();
//!     handle.spawn_affine(move || upload(pixels)).unwrap();
//! })?;
//!
//! // Runs even while the game is paused.
//! executor.schedule(|| autosave(), Duration::from_secs(30))?;
//!
//! loop {
//!     driver.process_queued();
//!     render_frame();
//! }
//! ```
//!
//! ## Threading contract
//!
//! - Work passed to [`ExecutorHandle::spawn_affine`] only runs when the
//!   affinity thread calls [`AffinityDriver::process_queued`].
//! - Calling [`TaskHandle::wait`](task::TaskHandle::wait) on the affinity
//!   thread for affine work that has not run yet returns
//!   [`Error::Deadlock`] instead of hanging.
//! - After shutdown every submission returns [`Error::ServiceShutdown`].

mod error;
mod runtime;

pub use error::{Error, Failure, Result};
pub use runtime::builder::ExecutorBuilder;
pub use runtime::task;
pub use runtime::timer::ScheduledHandle;
pub use runtime::{AffinityDriver, ExecutorHandle, ExecutorService};

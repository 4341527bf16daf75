//! Background runner.
//!
//! This module contains the components that execute work on a pool of
//! worker threads.
//!
//! It is composed of:
//! - [`core`]: the runner itself, submission routing and lifecycle,
//! - [`worker`]: worker threads that run jobs using work-stealing.

pub(crate) mod core;
pub(crate) mod worker;

pub(crate) use self::core::BackgroundRunner;

//! Work-stealing queue components.
//!
//! This module implements the data structures used by the background pool
//! to distribute jobs across worker threads using a work-stealing strategy.
//!
//! It consists of:
//! - [`injector`]: a global queue for jobs submitted from outside the pool,
//! - [`queue`]: per-worker local queues used for nested submissions and
//!   job stealing.

pub(crate) mod injector;
pub(crate) mod queue;

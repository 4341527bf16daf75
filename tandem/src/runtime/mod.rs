//! Core executor components.
//!
//! This module contains the building blocks of the executor:
//! - the task abstraction shared by both runners,
//! - the background runner and its work-stealing queues,
//! - the affine runner bound to the affinity thread,
//! - the timer thread behind delayed scheduling,
//! - the service facade tying them together.
//!
//! Most users only interact with [`ExecutorService`], [`ExecutorHandle`]
//! and [`task::TaskHandle`].

mod affine;
mod background;
mod core;
mod work_stealing;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod timer;

pub mod task;

pub use self::core::{AffinityDriver, ExecutorHandle, ExecutorService};

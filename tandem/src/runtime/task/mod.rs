//! Task primitives.
//!
//! This module defines how the executor represents a unit of work and the
//! handle used to observe it.
//!
//! It includes:
//! - task state management,
//! - the type-erased [`Runnable`] jobs queued by both runners,
//! - [`TaskHandle`], the blocking, clonable view of a task's outcome.
//!
//! Most users only touch [`TaskHandle`] and [`TaskState`]; the lower-level
//! components are used internally by the runners.

pub(crate) mod core;
pub(crate) mod handle;
pub(crate) mod state;

pub(crate) use self::core::{Job, Runnable, Task};

pub use handle::TaskHandle;
pub use state::TaskState;

//! Delayed one-shot scheduling.
//!
//! A dedicated timer thread keeps a min-heap of entries and hands each
//! entry's action to a runner once its deadline passes. Nothing here knows
//! about simulation pause state: entries fire while the rest of the
//! application is paused.

pub(crate) mod core;
pub(crate) mod entry;
pub(crate) mod scheduled;

pub(crate) use self::core::{Command, Timer, TimerHandle};

pub use scheduled::ScheduledHandle;

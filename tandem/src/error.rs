//! Error types shared by every executor operation.

use std::any::Any;
use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A panic captured while running a unit of work.
///
/// The payload of the panic is reduced to its message so that the failure
/// can be handed to every waiter of a task, on any thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    message: String,
}

impl Failure {
    /// Builds a failure from the payload returned by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            String::from("work panicked with a non-string payload")
        };

        Self { message }
    }

    /// The panic message of the failed work.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

/// Errors reported by the executor and by task handles.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The submitted work panicked. The failure is kept in the task and
    /// reported to every caller of [`TaskHandle::wait`](crate::task::TaskHandle::wait).
    #[error("task failed: {0}")]
    Computation(#[source] Failure),

    /// The task was cancelled before it could complete.
    #[error("task was cancelled before completion")]
    Cancelled,

    /// `wait` was called on the affinity thread for work that only the
    /// affinity thread itself can run.
    #[error("waiting on the affinity thread for affine work would never complete")]
    Deadlock,

    /// The executor service no longer accepts work.
    #[error("executor service has been shut down")]
    ServiceShutdown,

    /// A bounded wait elapsed before the task reached a terminal state.
    #[error("timed out waiting for the task to complete")]
    TimedOut,

    /// The operating system refused to start one of the executor threads.
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[from] io::Error),
}

impl Error {
    /// Returns the captured failure if the work itself panicked.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::Computation(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::ServiceShutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::panic;

    #[test]
    fn failure_keeps_static_message() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(Failure::from_panic(payload).message(), "boom");
    }

    #[test]
    fn failure_keeps_formatted_message() {
        let id = 7;
        let payload = panic::catch_unwind(|| panic!("asset {id} missing")).unwrap_err();
        assert_eq!(Failure::from_panic(payload).message(), "asset 7 missing");
    }

    #[test]
    fn failure_with_opaque_payload() {
        let payload = panic::catch_unwind(|| panic::panic_any(42_u32)).unwrap_err();
        assert_eq!(
            Failure::from_panic(payload).message(),
            "work panicked with a non-string payload"
        );
    }

    #[test]
    fn computation_error_exposes_failure() {
        let error = Error::Computation(Failure {
            message: "bad texture".into(),
        });

        assert_eq!(error.failure().map(Failure::message), Some("bad texture"));
        assert_eq!(error.to_string(), "task failed: bad texture");
        assert!(!error.is_cancelled());
    }
}

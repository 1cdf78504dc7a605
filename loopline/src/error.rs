//! Error types reported by the event loop.
//!
//! Only misuse of the loop is an error. Stale timer fires (the timer was
//! stopped, replaced, or its owner dropped) are expected interleavings and
//! are handled as silent no-ops.

use crate::utils::Id;

use std::io;
use std::thread::ThreadId;
use thiserror::Error;

/// # Errors produced by the event loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
    /// `run` or `process_events` was called from a thread other than the
    /// one that started the loop.
    ///
    /// This is a contract violation by the embedding application: pumping
    /// from a second thread would break single-consumer execution.
    #[error(
        "event loop {loop_id}: run/process_events called from a thread that did not start the event loop"
    )]
    WrongThread {
        /// Loop that was misused.
        loop_id: Id,
        /// Thread that made the call.
        caller: ThreadId,
        /// Thread that started the loop, if any.
        owner: Option<ThreadId>,
    },

    /// `run` or `process_events` was called on a loop that is not started.
    ///
    /// Recoverable: start the loop and try again.
    #[error("event loop {loop_id}: run/process_events called but the event loop has not been started")]
    Inactive {
        /// Loop that was not started.
        loop_id: Id,
    },

    /// The thread hosting a launched loop could not be spawned.
    #[error("failed to spawn event loop thread: {0}")]
    Spawn(#[source] io::Error),

    /// The launched thread exited before the loop reached the running state.
    #[error("event loop {loop_id}: launched thread exited before the loop was running")]
    Launch {
        /// Loop that failed to launch.
        loop_id: Id,
    },
}

impl LoopError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopError::WrongThread { .. } => "loop_wrong_thread",
            LoopError::Inactive { .. } => "loop_inactive",
            LoopError::Spawn(_) => "loop_spawn_failed",
            LoopError::Launch { .. } => "loop_launch_failed",
        }
    }

    /// Returns `true` for errors that indicate a programming error in the
    /// caller rather than a recoverable condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoopError::WrongThread { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    #[test]
    fn labels_and_severity() {
        let wrong = LoopError::WrongThread {
            loop_id: 3,
            caller: thread::current().id(),
            owner: None,
        };
        assert_eq!(wrong.as_label(), "loop_wrong_thread");
        assert!(wrong.is_fatal());
        assert!(wrong.to_string().contains("event loop 3"));

        let inactive = LoopError::Inactive { loop_id: 4 };
        assert_eq!(inactive.as_label(), "loop_inactive");
        assert!(!inactive.is_fatal());
    }
}

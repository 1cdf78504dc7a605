//! Deferred tasks.
//!
//! A [`Task`] wraps a closure that runs exactly once, usually on an event
//! loop's consumer thread via [`EventLoop::post_task`](crate::EventLoop::post_task),
//! and lets any number of other threads wait for it to finish.

use crate::event::Callback;

use parking_lot::{Condvar, Mutex};

use std::fmt;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Result of waiting on a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The task had already completed when the wait began.
    Finished,

    /// The task completed while the caller was waiting.
    Ready,

    /// The timeout elapsed before the task completed.
    Timeout,
}

/// A unit of work that completes once.
///
/// Tasks are shared (`Arc<Task>`) between the thread that posts them and
/// the loop that invokes them.
pub struct Task {
    /// The closure; taken on first invocation.
    work: Mutex<Option<Callback>>,

    /// Set once the closure has returned.
    complete: Mutex<bool>,

    /// Notified when `complete` flips.
    condvar: Condvar,

    /// Thread that created the task.
    thread_id: ThreadId,
}

impl Task {
    /// Creates a task that will run `f` when invoked.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            work: Mutex::new(Some(Box::new(f))),
            complete: Mutex::new(false),
            condvar: Condvar::new(),
            thread_id: thread::current().id(),
        }
    }

    /// Runs the task on the calling thread.
    ///
    /// Only the first invocation runs the closure; later calls return
    /// immediately.
    pub fn invoke(&self) {
        let Some(work) = self.work.lock().take() else {
            return;
        };

        work();

        *self.complete.lock() = true;
        self.condvar.notify_all();
    }

    /// Blocks until the task has completed.
    ///
    /// A task that is never invoked (for example because its loop was
    /// stopped before reaching it) never completes; use
    /// [`wait_for`](Self::wait_for) when that is possible.
    pub fn wait(&self) -> WaitStatus {
        let mut complete = self.complete.lock();
        if *complete {
            return WaitStatus::Finished;
        }

        while !*complete {
            self.condvar.wait(&mut complete);
        }

        WaitStatus::Ready
    }

    /// Blocks until the task has completed or `timeout` has elapsed.
    ///
    /// A timeout too large to represent waits without a deadline.
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };

        let mut complete = self.complete.lock();
        if *complete {
            return WaitStatus::Finished;
        }

        while !*complete {
            if self.condvar.wait_until(&mut complete, deadline).timed_out() {
                break;
            }
        }

        if *complete {
            WaitStatus::Ready
        } else {
            WaitStatus::Timeout
        }
    }

    /// Returns `true` once the task has run.
    pub fn is_complete(&self) -> bool {
        *self.complete.lock()
    }

    /// Returns the id of the thread that created the task.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("complete", &self.is_complete())
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn invoke_runs_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let task = Task::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        task.invoke();
        task.invoke();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(task.wait(), WaitStatus::Finished);
    }

    #[test]
    fn wait_for_times_out_when_never_invoked() {
        let task = Task::new(|| {});
        assert_eq!(task.wait_for(Duration::from_millis(10)), WaitStatus::Timeout);
        assert!(!task.is_complete());
    }

    #[test]
    fn wait_is_ready_when_completed_elsewhere() {
        let task = Arc::new(Task::new(|| thread::sleep(Duration::from_millis(20))));
        assert_eq!(task.thread_id(), thread::current().id());

        let runner = task.clone();
        let handle = thread::spawn(move || runner.invoke());

        assert_eq!(task.wait(), WaitStatus::Ready);
        handle.join().unwrap();
    }

    #[test]
    fn wait_for_with_unbounded_timeout_waits_for_completion() {
        let task = Arc::new(Task::new(|| thread::sleep(Duration::from_millis(20))));

        let runner = task.clone();
        let handle = thread::spawn(move || runner.invoke());

        assert_eq!(task.wait_for(Duration::MAX), WaitStatus::Ready);
        handle.join().unwrap();

        assert_eq!(task.wait_for(Duration::MAX), WaitStatus::Finished);
    }
}

use super::EventLoop;
use super::core::Core;
use crate::event::{BlockingCallback, Callback, Event};
use crate::task::Task;

use tracing::trace;

use std::sync::{Arc, Weak};

/// Work as it sits in the reactor queue.
///
/// Every variant executes exactly once on the consumer thread.
pub(crate) enum Dispatch {
    Callback(Callback),
    Blocking(BlockingCallback),
    Task(Arc<Task>),

    /// A stop request, ordered after everything queued before it.
    Stop(Weak<Core>),
}

impl Dispatch {
    fn kind(&self) -> &'static str {
        match self {
            Dispatch::Callback(_) => "callback",
            Dispatch::Blocking(_) => "blocking_callback",
            Dispatch::Task(_) => "task",
            Dispatch::Stop(_) => "stop",
        }
    }

    fn execute(self) {
        match self {
            Dispatch::Callback(callback) => callback(),
            Dispatch::Blocking(callback) => callback.invoke(),
            Dispatch::Task(task) => task.invoke(),
            Dispatch::Stop(core) => {
                if let Some(core) = core.upgrade() {
                    core.stop();
                }
            }
        }
    }
}

impl EventLoop {
    /// Posts an event to the loop.
    ///
    /// Timer events are applied immediately on the calling thread, so a
    /// timer's interval is measured from this call rather than from
    /// whenever the queue gets to it. All other events are queued and run
    /// on the consumer thread in posting order.
    pub fn post_event(&self, event: Event) {
        match event {
            Event::StartTimer(request) => self.core.start_timer(request),
            Event::StopTimer { timer_id } => self.core.stop_timer(timer_id),
            Event::RunCallback(callback) => self.dispatch(Dispatch::Callback(callback)),
            Event::RunBlockingCallback(callback) => self.dispatch(Dispatch::Blocking(callback)),
        }
    }

    /// Posts a task.
    ///
    /// When called from the loop's own thread the task is invoked right
    /// away, before this returns, so that a caller which then waits on the
    /// task cannot deadlock itself. From any other thread the task is
    /// queued.
    pub fn post_task(&self, task: Arc<Task>) {
        if self.on_loop_thread() {
            task.invoke();
            return;
        }

        self.dispatch(Dispatch::Task(task));
    }

    /// Queues `f` to run once on the consumer thread.
    pub fn post_callback<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Dispatch::Callback(Box::new(f)));
    }

    /// Queues a request to stop the loop.
    ///
    /// Work posted before the request still runs; work posted after it is
    /// discarded by the stop.
    pub fn post_stop_event(&self) {
        self.dispatch(Dispatch::Stop(Arc::downgrade(&self.core)));
    }

    fn dispatch(&self, item: Dispatch) {
        trace!(loop_id = self.core.id, kind = item.kind(), "queued work");
        self.core.reactor.post(Box::new(move || item.execute()));
    }
}

use super::EventLoop;
use crate::utils::{IdAllocator, IdSource};

use std::sync::Arc;

/// Builder for configuring and creating an event loop.
///
/// # Examples
///
/// ```rust,ignore
/// let event_loop = EventLoopBuilder::new()
///     .thread_name("ui-loop")
///     .build();
/// ```
pub struct EventLoopBuilder {
    /// Name of the thread spawned by `launch_in_thread`.
    thread_name: Option<String>,

    /// Stack size of the thread spawned by `launch_in_thread`.
    stack_size: Option<usize>,

    /// Source of the loop id and of ids for timers created on the loop.
    id_source: Arc<dyn IdSource>,
}

impl EventLoopBuilder {
    /// Creates a builder with the default configuration.
    ///
    /// By default, launched threads are unnamed, use the platform stack
    /// size, and ids come from [`IdAllocator::global`].
    pub fn new() -> Self {
        Self {
            thread_name: None,
            stack_size: None,
            id_source: Arc::new(IdAllocator::global()),
        }
    }

    /// Names the thread spawned by [`EventLoop::launch_in_thread`].
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Sets the stack size of the thread spawned by
    /// [`EventLoop::launch_in_thread`].
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn stack_size(mut self, size: usize) -> Self {
        assert!(size > 0, "stack_size must be > 0");

        self.stack_size = Some(size);
        self
    }

    /// Uses `ids` instead of the process-wide allocator.
    pub fn id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.id_source = ids;
        self
    }

    /// Builds the loop. The loop is created stopped.
    pub fn build(self) -> EventLoop {
        EventLoop::from_parts(self.id_source, self.thread_name, self.stack_size)
    }
}

impl Default for EventLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

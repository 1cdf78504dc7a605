//! Small process-level utilities.
//!
//! This module provides the identity allocator shared by event loops and
//! timers.

mod id;

pub use id::{Id, IdAllocator, IdSource};

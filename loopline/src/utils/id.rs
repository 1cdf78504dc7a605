use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier type used for event loops and timers.
///
/// Ids are never recycled. The value `0` is reserved to mean "unset".
pub type Id = u64;

/// A source of unique identifiers.
///
/// Implementations must be thread-safe, strictly increasing and must
/// never hand out `0`.
pub trait IdSource: Send + Sync {
    /// Returns the next identifier.
    fn next_id(&self) -> Id;
}

/// Monotonic identity allocator.
///
/// The process-wide instance is available through [`IdAllocator::global`];
/// it is initialized at compile time and stays monotonic for the whole
/// life of the process. Independent allocators can be created for tests or
/// for embedding applications that want their own id space.
#[derive(Debug)]
pub struct IdAllocator {
    /// Next id to hand out.
    next: AtomicU64,
}

impl<T: IdSource + ?Sized> IdSource for &T {
    fn next_id(&self) -> Id {
        (**self).next_id()
    }
}

static GLOBAL: IdAllocator = IdAllocator::new();

impl IdAllocator {
    /// Creates an allocator whose first id is `1`.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the process-wide allocator.
    pub fn global() -> &'static IdAllocator {
        &GLOBAL
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for IdAllocator {
    fn next_id(&self) -> Id {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
